use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use campus_core::model::Cart;
use campus_core::repository::{CartRepository, CourseRepository, EnrollmentRepository};
use campus_core::{CoreError, CoreResult};

/// The cart aggregate: a student's pending selection. Availability checks
/// here are advisory only; no seat is consumed until the order is placed,
/// so a course can still fill up between add-to-cart and checkout.
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
    ) -> Self {
        Self {
            carts,
            courses,
            enrollments,
        }
    }

    /// First access creates an empty cart for the student; after that the
    /// same cart is returned for life.
    pub async fn get(&self, student_id: Uuid) -> CoreResult<Cart> {
        self.carts.get_or_create_cart(student_id).await
    }

    pub async fn add_course(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<Cart> {
        let cart = self.carts.get_or_create_cart(student_id).await?;

        let available = self.courses.peek_available(course_id).await?;
        if self.enrollments.is_enrolled(student_id, course_id).await? {
            return Err(CoreError::AlreadyEnrolled(course_id));
        }
        if !available {
            return Err(CoreError::CourseNotOpen(course_id));
        }
        if cart.contains_course(course_id) {
            return Err(CoreError::CourseAlreadyInCart(course_id));
        }

        self.carts.insert_line(cart.id, course_id).await?;
        self.carts.recompute_total(cart.id).await?;
        debug!(student_id = %student_id, course_id = %course_id, "course added to cart");
        self.reload(student_id).await
    }

    pub async fn remove_course(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<Cart> {
        let cart = self
            .carts
            .get_cart(student_id)
            .await?
            .ok_or(CoreError::CartNotFound(student_id))?;

        if !self.carts.delete_line(cart.id, course_id).await? {
            return Err(CoreError::CourseNotInCart(course_id));
        }
        self.carts.recompute_total(cart.id).await?;
        self.reload(student_id).await
    }

    pub async fn clear(&self, student_id: Uuid) -> CoreResult<Cart> {
        let cart = self.carts.get_or_create_cart(student_id).await?;
        self.carts.clear_lines(cart.id).await?;
        self.carts.recompute_total(cart.id).await?;
        self.reload(student_id).await
    }

    /// Replace the whole selection in one call. Validated like a sequence
    /// of adds; a repeated id in the request is the same duplicate-line
    /// conflict it would be one by one.
    pub async fn replace_all(&self, student_id: Uuid, course_ids: Vec<Uuid>) -> CoreResult<Cart> {
        let cart = self.carts.get_or_create_cart(student_id).await?;

        let mut seen = HashSet::new();
        for course_id in &course_ids {
            if !seen.insert(*course_id) {
                return Err(CoreError::CourseAlreadyInCart(*course_id));
            }
            if !self.courses.peek_available(*course_id).await? {
                return Err(CoreError::CourseNotOpen(*course_id));
            }
            if self.enrollments.is_enrolled(student_id, *course_id).await? {
                return Err(CoreError::AlreadyEnrolled(*course_id));
            }
        }

        self.carts.clear_lines(cart.id).await?;
        for course_id in &course_ids {
            self.carts.insert_line(cart.id, *course_id).await?;
        }
        self.carts.recompute_total(cart.id).await?;
        self.reload(student_id).await
    }

    async fn reload(&self, student_id: Uuid) -> CoreResult<Cart> {
        self.carts
            .get_cart(student_id)
            .await?
            .ok_or(CoreError::CartNotFound(student_id))
    }
}
