use serde::Serialize;

use super::model::{Course, Lecture};

#[derive(Debug, Serialize)]
pub struct CourseList {
    pub success: bool,
    pub message: &'static str,
    pub courses: Vec<Course>,
}

#[derive(Debug, Serialize)]
pub struct CourseEnvelope {
    pub success: bool,
    pub message: &'static str,
    pub course: Course,
}

#[derive(Debug, Serialize)]
pub struct LectureList {
    pub success: bool,
    pub message: &'static str,
    pub lectures: Vec<Lecture>,
}

#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: &'static str,
}
