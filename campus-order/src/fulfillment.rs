use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use campus_core::model::{Course, Order};
use campus_core::repository::{
    CartRepository, CourseRepository, EnrollmentRepository, OrderRepository, StudentRepository,
};
use campus_core::{CoreError, CoreResult};

/// Converts a cart into a completed order: re-validate every line, consume
/// one seat per course, persist the order with frozen prices, record the
/// enrollments, clear the cart. Any failure along the way compensates
/// whatever already happened, so the caller observes all-or-nothing.
pub struct FulfillmentService {
    courses: Arc<dyn CourseRepository>,
    carts: Arc<dyn CartRepository>,
    orders: Arc<dyn OrderRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    students: Arc<dyn StudentRepository>,
    max_code_attempts: u32,
}

impl FulfillmentService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        carts: Arc<dyn CartRepository>,
        orders: Arc<dyn OrderRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        students: Arc<dyn StudentRepository>,
        max_code_attempts: u32,
    ) -> Self {
        Self {
            courses,
            carts,
            orders,
            enrollments,
            students,
            max_code_attempts: max_code_attempts.max(1),
        }
    }

    /// Place an order for everything in the student's cart.
    ///
    /// The advisory checks done at add-to-cart time are repeated here in
    /// full: capacity may have been exhausted by a concurrent purchaser
    /// since. Seats are reserved in ascending course-id order so two
    /// placements contending on overlapping carts always lock in the same
    /// sequence.
    pub async fn place_order(&self, student_id: Uuid) -> CoreResult<Order> {
        if !self.students.student_exists(student_id).await? {
            return Err(CoreError::StudentNotFound(student_id));
        }

        // A student who never touched their cart simply has nothing in it.
        let cart = match self.carts.get_cart(student_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(CoreError::EmptyCart),
        };

        let mut course_ids: Vec<Uuid> = cart.lines.iter().map(|l| l.course_id).collect();
        course_ids.sort();

        // Validate every line before touching the ledger: one bad line
        // aborts the whole placement with nothing to undo.
        let mut courses: Vec<Course> = Vec::with_capacity(course_ids.len());
        for course_id in &course_ids {
            let course = self
                .courses
                .get_course(*course_id)
                .await?
                .ok_or(CoreError::CourseNotFound(*course_id))?;
            if !course.can_enroll() {
                return Err(CoreError::CourseNotOpen(*course_id));
            }
            if self.enrollments.is_enrolled(student_id, *course_id).await? {
                return Err(CoreError::AlreadyEnrolled(*course_id));
            }
            courses.push(course);
        }

        // Consume seats. A single failed reservation returns everything
        // reserved so far and aborts.
        let mut reserved: Vec<Uuid> = Vec::with_capacity(course_ids.len());
        for course in &courses {
            match self.courses.try_reserve_seat(course.id).await {
                Ok(true) => reserved.push(course.id),
                Ok(false) => {
                    self.release_seats(student_id, &reserved).await;
                    return Err(CoreError::CapacityExhausted(course.id));
                }
                Err(err) => {
                    self.release_seats(student_id, &reserved).await;
                    return Err(err);
                }
            }
        }

        let order = match self.persist_order(student_id, &courses).await {
            Ok(order) => order,
            Err(err) => {
                self.release_seats(student_id, &reserved).await;
                return Err(err);
            }
        };

        let mut enrolled: Vec<Uuid> = Vec::with_capacity(course_ids.len());
        for course_id in &course_ids {
            if let Err(err) = self.enrollments.add_enrollment(student_id, *course_id).await {
                self.unwind(student_id, &enrolled, order.id, &reserved).await;
                return Err(err);
            }
            enrolled.push(*course_id);
        }

        if let Err(err) = self.clear_cart(cart.id).await {
            self.unwind(student_id, &enrolled, order.id, &reserved).await;
            return Err(err);
        }

        info!(
            order_code = %order.order_code,
            student_id = %student_id,
            total_cents = order.total_cents,
            lines = order.lines.len(),
            "order placed"
        );
        Ok(order)
    }

    pub async fn order_for_code(&self, code: &str) -> CoreResult<Order> {
        self.orders
            .get_order_by_code(code)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(code.to_string()))
    }

    pub async fn orders_for_student(&self, student_id: Uuid) -> CoreResult<Vec<Order>> {
        if !self.students.student_exists(student_id).await? {
            return Err(CoreError::StudentNotFound(student_id));
        }
        self.orders.list_orders_for_student(student_id).await
    }

    /// Insert the order, regenerating the code on a collision up to the
    /// configured budget.
    async fn persist_order(&self, student_id: Uuid, courses: &[Course]) -> CoreResult<Order> {
        let mut order = Order::from_courses(student_id, courses);
        let mut attempt = 1;
        loop {
            match self.orders.insert_order(&order).await {
                Ok(()) => return Ok(order),
                Err(CoreError::DuplicateOrderCode(code)) => {
                    if attempt >= self.max_code_attempts {
                        warn!(code = %code, attempt, "order code collisions exhausted retry budget");
                        return Err(CoreError::OrderCodeExhausted);
                    }
                    warn!(code = %code, attempt, "order code collision, regenerating");
                    order.regenerate_code();
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn clear_cart(&self, cart_id: Uuid) -> CoreResult<()> {
        self.carts.clear_lines(cart_id).await?;
        self.carts.recompute_total(cart_id).await?;
        Ok(())
    }

    async fn release_seats(&self, student_id: Uuid, reserved: &[Uuid]) {
        for course_id in reserved {
            if let Err(err) = self.courses.release_seat(*course_id).await {
                // The invariant check in the store keeps the count sane;
                // nothing more can be done here but record it.
                warn!(
                    student_id = %student_id,
                    course_id = %course_id,
                    error = %err,
                    "failed to release seat during rollback"
                );
            }
        }
    }

    /// Full compensation for a failure after the order row exists.
    async fn unwind(&self, student_id: Uuid, enrolled: &[Uuid], order_id: Uuid, reserved: &[Uuid]) {
        for course_id in enrolled {
            if let Err(err) = self
                .enrollments
                .remove_enrollment(student_id, *course_id)
                .await
            {
                warn!(
                    student_id = %student_id,
                    course_id = %course_id,
                    error = %err,
                    "failed to remove enrollment during rollback"
                );
            }
        }
        if let Err(err) = self.orders.delete_order(order_id).await {
            warn!(order_id = %order_id, error = %err, "failed to delete order during rollback");
        }
        self.release_seats(student_id, reserved).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use campus_cart::CartService;
    use campus_catalog::CatalogService;
    use campus_core::model::{OrderStatus, Student};
    use campus_core::repository::{
        CourseRepository as _, EnrollmentRepository as _, StudentRepository as _,
    };
    use campus_store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        catalog: CatalogService,
        carts: CartService,
        fulfillment: FulfillmentService,
        teacher_id: Uuid,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        Fixture {
            catalog: CatalogService::new(store.clone(), store.clone(), store.clone()),
            carts: CartService::new(store.clone(), store.clone(), store.clone()),
            fulfillment: FulfillmentService::new(
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                store.clone(),
                3,
            ),
            store,
            teacher_id: Uuid::new_v4(),
        }
    }

    impl Fixture {
        async fn student(&self, email: &str) -> Uuid {
            let student = Student::new("Student".into(), email.into()).unwrap();
            self.store.insert_student(&student).await.unwrap();
            student.id
        }

        async fn course(&self, name: &str, price_cents: i64, max_seats: i32) -> Uuid {
            self.catalog
                .create_course(self.teacher_id, name.into(), None, price_cents, max_seats)
                .await
                .unwrap()
                .id
        }

        async fn enrolled_count(&self, course_id: Uuid) -> i32 {
            self.store
                .get_course(course_id)
                .await
                .unwrap()
                .unwrap()
                .enrolled_count
        }
    }

    #[tokio::test]
    async fn placing_a_two_course_cart_produces_one_order() {
        let f = fixture();
        let student = f.student("s1@example.com").await;
        let b = f.course("B", 1000, 10).await;
        let c = f.course("C", 2000, 10).await;
        f.carts.add_course(student, b).await.unwrap();
        f.carts.add_course(student, c).await.unwrap();

        let order = f.fulfillment.place_order(student).await.unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.total_cents, 3000);
        assert_eq!(order.lines.len(), 2);
        assert!(order.order_code.starts_with("ORD-"));

        // Cart emptied, seats consumed, ownership recorded.
        let cart = f.carts.get(student).await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.total_cents, 0);
        assert_eq!(f.enrolled_count(b).await, 1);
        assert_eq!(f.enrolled_count(c).await, 1);
        assert!(f.store.is_enrolled(student, b).await.unwrap());
        assert!(f.store.is_enrolled(student, c).await.unwrap());
    }

    #[tokio::test]
    async fn empty_cart_placement_creates_nothing() {
        let f = fixture();
        let student = f.student("s1@example.com").await;

        // Never-touched cart and explicitly emptied cart behave the same.
        let err = f.fulfillment.place_order(student).await.unwrap_err();
        assert!(matches!(err, CoreError::EmptyCart));

        let a = f.course("A", 1000, 10).await;
        f.carts.add_course(student, a).await.unwrap();
        f.carts.clear(student).await.unwrap();
        let err = f.fulfillment.place_order(student).await.unwrap_err();
        assert!(matches!(err, CoreError::EmptyCart));

        assert!(f
            .fulfillment
            .orders_for_student(student)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn unknown_student_cannot_place() {
        let f = fixture();
        let err = f.fulfillment.place_order(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::StudentNotFound(_)));
    }

    #[tokio::test]
    async fn course_closed_after_add_aborts_whole_placement() {
        let f = fixture();
        let student = f.student("s1@example.com").await;
        let a = f.course("A", 1000, 10).await;
        let b = f.course("B", 2000, 10).await;
        f.carts.add_course(student, a).await.unwrap();
        f.carts.add_course(student, b).await.unwrap();
        f.catalog
            .set_availability(f.teacher_id, b, false)
            .await
            .unwrap();

        let err = f.fulfillment.place_order(student).await.unwrap_err();
        assert!(matches!(err, CoreError::CourseNotOpen(id) if id == b));

        // No partial effects: cart intact, no seats taken, no order.
        let cart = f.carts.get(student).await.unwrap();
        assert_eq!(cart.lines.len(), 2);
        assert_eq!(f.enrolled_count(a).await, 0);
        assert_eq!(f.enrolled_count(b).await, 0);
        assert!(f
            .fulfillment
            .orders_for_student(student)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn already_owned_course_aborts_placement() {
        let f = fixture();
        let student = f.student("s1@example.com").await;
        let a = f.course("A", 1000, 10).await;
        f.carts.add_course(student, a).await.unwrap();
        // Ownership recorded between add-to-cart and checkout.
        f.store.add_enrollment(student, a).await.unwrap();

        let err = f.fulfillment.place_order(student).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyEnrolled(id) if id == a));
        assert_eq!(f.enrolled_count(a).await, 0);
    }

    #[tokio::test]
    async fn failed_reservation_releases_earlier_ones() {
        let f = fixture();
        let student = f.student("s1@example.com").await;
        let a = f.course("A", 1000, 10).await;
        let b = f.course("B", 2000, 1).await;
        f.carts.add_course(student, a).await.unwrap();
        f.carts.add_course(student, b).await.unwrap();

        // A concurrent purchaser takes B's last seat between this
        // student's add-to-cart and checkout. Whichever way the two ids
        // sort, the placement must end with zero seats held for A.
        assert!(f.store.try_reserve_seat(b).await.unwrap());

        let err = f.fulfillment.place_order(student).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityExhausted(id) if id == b));

        // The seat reserved for A (if any) was returned.
        assert_eq!(f.enrolled_count(a).await, 0);
        assert_eq!(f.enrolled_count(b).await, 1);
        let cart = f.carts.get(student).await.unwrap();
        assert_eq!(cart.lines.len(), 2);
        assert!(f
            .fulfillment
            .orders_for_student(student)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn no_oversell_under_contention() {
        let f = fixture();
        let seats = 3;
        let contenders = 10;
        let course = f.course("Hot", 5000, seats).await;

        let mut students = Vec::new();
        for i in 0..contenders {
            let student = f.student(&format!("s{}@example.com", i)).await;
            f.carts.add_course(student, course).await.unwrap();
            students.push(student);
        }

        let mut handles = Vec::new();
        for student in &students {
            let service = FulfillmentService::new(
                f.store.clone(),
                f.store.clone(),
                f.store.clone(),
                f.store.clone(),
                f.store.clone(),
                3,
            );
            let student = *student;
            handles.push(tokio::spawn(
                async move { service.place_order(student).await },
            ));
        }

        let mut won = 0;
        let mut lost = 0;
        let mut loser = None;
        for (student, handle) in students.iter().zip(handles) {
            match handle.await.unwrap() {
                Ok(order) => {
                    assert_eq!(order.total_cents, 5000);
                    won += 1;
                }
                Err(CoreError::CapacityExhausted(id)) => {
                    assert_eq!(id, course);
                    loser = Some(*student);
                    lost += 1;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(won, seats);
        assert_eq!(lost, contenders - seats);
        assert_eq!(f.enrolled_count(course).await, seats);

        // A losing student keeps the line; removing it is their call.
        let cart = f.carts.get(loser.unwrap()).await.unwrap();
        assert!(cart.contains_course(course));
    }

    #[tokio::test]
    async fn second_purchase_of_same_course_conflicts() {
        let f = fixture();
        let student = f.student("s1@example.com").await;
        let a = f.course("A", 1000, 10).await;
        f.carts.add_course(student, a).await.unwrap();
        f.fulfillment.place_order(student).await.unwrap();

        // The cart path already refuses an owned course.
        let err = f.carts.add_course(student, a).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyEnrolled(_)));

        assert_eq!(f.enrolled_count(a).await, 1);
        assert_eq!(
            f.fulfillment.orders_for_student(student).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn completed_orders_ignore_later_price_changes() {
        let f = fixture();
        let student = f.student("s1@example.com").await;
        let a = f.course("A", 1000, 10).await;
        f.carts.add_course(student, a).await.unwrap();
        let order = f.fulfillment.place_order(student).await.unwrap();

        f.catalog
            .update_course(f.teacher_id, a, "A".into(), None, 9900, 10)
            .await
            .unwrap();

        let fetched = f.fulfillment.order_for_code(&order.order_code).await.unwrap();
        assert_eq!(fetched.total_cents, 1000);
        assert_eq!(fetched.lines[0].price_cents, 1000);
    }

    #[tokio::test]
    async fn order_codes_stay_distinct_across_placements() {
        let f = fixture();
        let mut codes = std::collections::HashSet::new();
        for i in 0..20 {
            let student = f.student(&format!("s{}@example.com", i)).await;
            let course = f.course(&format!("C{}", i), 100, 5).await;
            f.carts.add_course(student, course).await.unwrap();
            let order = f.fulfillment.place_order(student).await.unwrap();
            assert!(codes.insert(order.order_code));
        }
        assert_eq!(codes.len(), 20);
    }

    #[tokio::test]
    async fn unknown_order_code_is_not_found() {
        let f = fixture();
        let err = f.fulfillment.order_for_code("ORD-DOESNOTEXIST").await.unwrap_err();
        assert!(matches!(err, CoreError::OrderNotFound(_)));

        let err = f
            .fulfillment
            .orders_for_student(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::StudentNotFound(_)));
    }

    /// Order store that reports a code collision on every insert, to drive
    /// the retry budget to exhaustion.
    struct CollidingOrders;

    #[async_trait]
    impl campus_core::repository::OrderRepository for CollidingOrders {
        async fn insert_order(&self, order: &Order) -> CoreResult<()> {
            Err(CoreError::DuplicateOrderCode(order.order_code.clone()))
        }

        async fn delete_order(&self, _order_id: Uuid) -> CoreResult<()> {
            Ok(())
        }

        async fn get_order_by_code(&self, _code: &str) -> CoreResult<Option<Order>> {
            Ok(None)
        }

        async fn list_orders_for_student(&self, _student_id: Uuid) -> CoreResult<Vec<Order>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn exhausted_code_retries_release_the_seats() {
        let f = fixture();
        let student = f.student("s1@example.com").await;
        let a = f.course("A", 1000, 10).await;
        f.carts.add_course(student, a).await.unwrap();

        let service = FulfillmentService::new(
            f.store.clone(),
            f.store.clone(),
            Arc::new(CollidingOrders),
            f.store.clone(),
            f.store.clone(),
            3,
        );

        let err = service.place_order(student).await.unwrap_err();
        assert!(matches!(err, CoreError::OrderCodeExhausted));

        // The reserved seat came back and nothing else happened.
        assert_eq!(f.enrolled_count(a).await, 0);
        assert!(!f.store.is_enrolled(student, a).await.unwrap());
        let cart = f.carts.get(student).await.unwrap();
        assert_eq!(cart.lines.len(), 1);
    }
}
