use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use campus_core::model::Course;
use campus_core::repository::{CourseRepository, EnrollmentRepository, StudentRepository};
use campus_core::{CoreError, CoreResult};

/// Course catalog operations: teacher-owned administration and the
/// read-only projections students browse. Seat consumption is not driven
/// from here; only the fulfillment transaction takes seats.
pub struct CatalogService {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    students: Arc<dyn StudentRepository>,
}

impl CatalogService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        students: Arc<dyn StudentRepository>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            students,
        }
    }

    pub async fn create_course(
        &self,
        teacher_id: Uuid,
        name: String,
        description: Option<String>,
        price_cents: i64,
        max_seats: i32,
    ) -> CoreResult<Course> {
        let course = Course::new(teacher_id, name, description, price_cents, max_seats)?;
        self.courses.insert_course(&course).await?;
        info!(course_id = %course.id, teacher_id = %teacher_id, max_seats, "course created");
        Ok(course)
    }

    pub async fn update_course(
        &self,
        teacher_id: Uuid,
        course_id: Uuid,
        name: String,
        description: Option<String>,
        price_cents: i64,
        max_seats: i32,
    ) -> CoreResult<Course> {
        self.require_owner(teacher_id, course_id).await?;
        self.courses
            .update_course_details(course_id, name, description, price_cents, max_seats)
            .await
    }

    /// Manual open/close. The ledger clamps a force-open at capacity, so a
    /// full course can only be closed here.
    pub async fn set_availability(
        &self,
        teacher_id: Uuid,
        course_id: Uuid,
        open: bool,
    ) -> CoreResult<Course> {
        self.require_owner(teacher_id, course_id).await?;
        let course = self.courses.set_open(course_id, open).await?;
        info!(course_id = %course_id, open, "course availability changed");
        Ok(course)
    }

    pub async fn get_course(&self, id: Uuid) -> CoreResult<Course> {
        self.courses
            .get_course(id)
            .await?
            .ok_or(CoreError::CourseNotFound(id))
    }

    pub async fn list_all(&self) -> CoreResult<Vec<Course>> {
        self.courses.list_courses().await
    }

    pub async fn list_available(&self) -> CoreResult<Vec<Course>> {
        self.courses.list_available_courses().await
    }

    pub async fn list_for_teacher(&self, teacher_id: Uuid) -> CoreResult<Vec<Course>> {
        self.courses.list_courses_by_teacher(teacher_id).await
    }

    pub async fn enrolled_courses(&self, student_id: Uuid) -> CoreResult<Vec<Course>> {
        if !self.students.student_exists(student_id).await? {
            return Err(CoreError::StudentNotFound(student_id));
        }
        self.enrollments.list_enrolled_courses(student_id).await
    }

    async fn require_owner(&self, teacher_id: Uuid, course_id: Uuid) -> CoreResult<()> {
        let course = self.get_course(course_id).await?;
        if course.teacher_id != teacher_id {
            return Err(CoreError::NotCourseOwner(course_id));
        }
        Ok(())
    }
}
