use std::sync::Arc;

use tokio::sync::broadcast;

use campus_cart::CartService;
use campus_catalog::CatalogService;
use campus_core::repository::{
    CartRepository, CourseRepository, EnrollmentRepository, OrderRepository, StudentRepository,
};
use campus_order::FulfillmentService;
use campus_shared::events::CourseAvailabilityEvent;

#[derive(Clone)]
pub struct AuthSettings {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub students: Arc<dyn StudentRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub catalog: Arc<CatalogService>,
    pub carts: Arc<CartService>,
    pub fulfillment: Arc<FulfillmentService>,
    pub availability_tx: broadcast::Sender<CourseAvailabilityEvent>,
    pub auth: AuthSettings,
}

impl AppState {
    /// Wire the services over any set of repository implementations:
    /// the Postgres store in production, the in-memory store in tests.
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        carts: Arc<dyn CartRepository>,
        orders: Arc<dyn OrderRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        students: Arc<dyn StudentRepository>,
        auth: AuthSettings,
        max_code_attempts: u32,
    ) -> Self {
        let (availability_tx, _) = broadcast::channel(64);
        Self {
            catalog: Arc::new(CatalogService::new(
                courses.clone(),
                enrollments.clone(),
                students.clone(),
            )),
            carts: Arc::new(CartService::new(
                carts.clone(),
                courses.clone(),
                enrollments.clone(),
            )),
            fulfillment: Arc::new(FulfillmentService::new(
                courses.clone(),
                carts,
                orders,
                enrollments,
                students.clone(),
                max_code_attempts,
            )),
            students,
            courses,
            availability_tx,
            auth,
        }
    }
}
