use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use campus_core::model::{Cart, CartLine, Course, Order, Student};
use campus_core::repository::{
    CartRepository, CourseRepository, EnrollmentRepository, OrderRepository, StudentRepository,
};
use campus_core::{CoreError, CoreResult};

/// In-memory implementation of every repository trait, for tests and local
/// runs without Postgres. Seat accounting happens inside a single write
/// lock on the course table, which gives the same atomicity as the store's
/// conditional UPDATE.
///
/// Lock order when a method needs more than one table:
/// students → courses → carts → orders → enrollments.
#[derive(Default)]
pub struct MemoryStore {
    students: RwLock<HashMap<Uuid, Student>>,
    courses: RwLock<HashMap<Uuid, Course>>,
    carts: RwLock<HashMap<Uuid, StoredCart>>,
    orders: RwLock<HashMap<Uuid, Order>>,
    enrollments: RwLock<Vec<EnrollmentRow>>,
}

struct StoredCart {
    id: Uuid,
    student_id: Uuid,
    lines: Vec<StoredCartLine>,
    total_cents: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct StoredCartLine {
    id: Uuid,
    course_id: Uuid,
    added_at: DateTime<Utc>,
}

struct EnrollmentRow {
    student_id: Uuid,
    course_id: Uuid,
    enrolled_at: DateTime<Utc>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn assemble_cart(stored: &StoredCart, courses: &HashMap<Uuid, Course>) -> CoreResult<Cart> {
    let mut lines = Vec::with_capacity(stored.lines.len());
    for line in &stored.lines {
        let course = courses
            .get(&line.course_id)
            .ok_or_else(|| CoreError::Storage(format!("cart line references missing course {}", line.course_id)))?;
        lines.push(CartLine {
            id: line.id,
            course_id: line.course_id,
            course_name: course.name.clone(),
            price_cents: course.price_cents,
            added_at: line.added_at,
        });
    }
    Ok(Cart {
        id: stored.id,
        student_id: stored.student_id,
        lines,
        total_cents: stored.total_cents,
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    })
}

#[async_trait]
impl CourseRepository for MemoryStore {
    async fn insert_course(&self, course: &Course) -> CoreResult<()> {
        self.courses.write().await.insert(course.id, course.clone());
        Ok(())
    }

    async fn update_course_details(
        &self,
        id: Uuid,
        name: String,
        description: Option<String>,
        price_cents: i64,
        max_seats: i32,
    ) -> CoreResult<Course> {
        let mut courses = self.courses.write().await;
        let course = courses
            .get_mut(&id)
            .ok_or(CoreError::CourseNotFound(id))?;
        course.update_details(name, description, price_cents, max_seats)?;
        Ok(course.clone())
    }

    async fn get_course(&self, id: Uuid) -> CoreResult<Option<Course>> {
        Ok(self.courses.read().await.get(&id).cloned())
    }

    async fn list_courses(&self) -> CoreResult<Vec<Course>> {
        let mut all: Vec<Course> = self.courses.read().await.values().cloned().collect();
        all.sort_by_key(|c| c.created_at);
        Ok(all)
    }

    async fn list_available_courses(&self) -> CoreResult<Vec<Course>> {
        let mut open: Vec<Course> = self
            .courses
            .read()
            .await
            .values()
            .filter(|c| c.can_enroll())
            .cloned()
            .collect();
        open.sort_by_key(|c| c.created_at);
        Ok(open)
    }

    async fn list_courses_by_teacher(&self, teacher_id: Uuid) -> CoreResult<Vec<Course>> {
        let mut owned: Vec<Course> = self
            .courses
            .read()
            .await
            .values()
            .filter(|c| c.teacher_id == teacher_id)
            .cloned()
            .collect();
        owned.sort_by_key(|c| c.created_at);
        Ok(owned)
    }

    async fn count_courses(&self) -> CoreResult<i64> {
        Ok(self.courses.read().await.len() as i64)
    }

    async fn try_reserve_seat(&self, course_id: Uuid) -> CoreResult<bool> {
        let mut courses = self.courses.write().await;
        let course = courses
            .get_mut(&course_id)
            .ok_or(CoreError::CourseNotFound(course_id))?;
        Ok(course.reserve_seat())
    }

    async fn release_seat(&self, course_id: Uuid) -> CoreResult<()> {
        let mut courses = self.courses.write().await;
        let course = courses
            .get_mut(&course_id)
            .ok_or(CoreError::CourseNotFound(course_id))?;
        course.release_seat();
        Ok(())
    }

    async fn set_open(&self, course_id: Uuid, open: bool) -> CoreResult<Course> {
        let mut courses = self.courses.write().await;
        let course = courses
            .get_mut(&course_id)
            .ok_or(CoreError::CourseNotFound(course_id))?;
        course.set_open(open)?;
        Ok(course.clone())
    }

    async fn peek_available(&self, course_id: Uuid) -> CoreResult<bool> {
        let courses = self.courses.read().await;
        let course = courses
            .get(&course_id)
            .ok_or(CoreError::CourseNotFound(course_id))?;
        Ok(course.can_enroll())
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn get_cart(&self, student_id: Uuid) -> CoreResult<Option<Cart>> {
        let courses = self.courses.read().await;
        let carts = self.carts.read().await;
        match carts.get(&student_id) {
            Some(stored) => Ok(Some(assemble_cart(stored, &courses)?)),
            None => Ok(None),
        }
    }

    async fn get_or_create_cart(&self, student_id: Uuid) -> CoreResult<Cart> {
        if !self.students.read().await.contains_key(&student_id) {
            return Err(CoreError::StudentNotFound(student_id));
        }
        let courses = self.courses.read().await;
        let mut carts = self.carts.write().await;
        let stored = carts.entry(student_id).or_insert_with(|| {
            let now = Utc::now();
            StoredCart {
                id: Uuid::new_v4(),
                student_id,
                lines: Vec::new(),
                total_cents: 0,
                created_at: now,
                updated_at: now,
            }
        });
        assemble_cart(stored, &courses)
    }

    async fn insert_line(&self, cart_id: Uuid, course_id: Uuid) -> CoreResult<()> {
        if !self.courses.read().await.contains_key(&course_id) {
            return Err(CoreError::CourseNotFound(course_id));
        }
        let mut carts = self.carts.write().await;
        let stored = carts
            .values_mut()
            .find(|c| c.id == cart_id)
            .ok_or_else(|| CoreError::Storage(format!("cart {} has no row", cart_id)))?;
        if stored.lines.iter().any(|l| l.course_id == course_id) {
            return Err(CoreError::CourseAlreadyInCart(course_id));
        }
        stored.lines.push(StoredCartLine {
            id: Uuid::new_v4(),
            course_id,
            added_at: Utc::now(),
        });
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_line(&self, cart_id: Uuid, course_id: Uuid) -> CoreResult<bool> {
        let mut carts = self.carts.write().await;
        let stored = carts
            .values_mut()
            .find(|c| c.id == cart_id)
            .ok_or_else(|| CoreError::Storage(format!("cart {} has no row", cart_id)))?;
        let before = stored.lines.len();
        stored.lines.retain(|l| l.course_id != course_id);
        let removed = stored.lines.len() < before;
        if removed {
            stored.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn clear_lines(&self, cart_id: Uuid) -> CoreResult<()> {
        let mut carts = self.carts.write().await;
        if let Some(stored) = carts.values_mut().find(|c| c.id == cart_id) {
            stored.lines.clear();
            stored.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn recompute_total(&self, cart_id: Uuid) -> CoreResult<i64> {
        let courses = self.courses.read().await;
        let mut carts = self.carts.write().await;
        let stored = carts
            .values_mut()
            .find(|c| c.id == cart_id)
            .ok_or_else(|| CoreError::Storage(format!("cart {} has no row", cart_id)))?;
        let mut total = 0i64;
        for line in &stored.lines {
            let course = courses
                .get(&line.course_id)
                .ok_or_else(|| CoreError::Storage(format!("cart line references missing course {}", line.course_id)))?;
            total += course.price_cents;
        }
        stored.total_cents = total;
        stored.updated_at = Utc::now();
        Ok(total)
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &Order) -> CoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.values().any(|o| o.order_code == order.order_code) {
            return Err(CoreError::DuplicateOrderCode(order.order_code.clone()));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn delete_order(&self, order_id: Uuid) -> CoreResult<()> {
        self.orders.write().await.remove(&order_id);
        Ok(())
    }

    async fn get_order_by_code(&self, code: &str) -> CoreResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .find(|o| o.order_code == code)
            .cloned())
    }

    async fn list_orders_for_student(&self, student_id: Uuid) -> CoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.student_id == student_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}

#[async_trait]
impl EnrollmentRepository for MemoryStore {
    async fn is_enrolled(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<bool> {
        Ok(self
            .enrollments
            .read()
            .await
            .iter()
            .any(|e| e.student_id == student_id && e.course_id == course_id))
    }

    async fn add_enrollment(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<()> {
        let mut enrollments = self.enrollments.write().await;
        if enrollments
            .iter()
            .any(|e| e.student_id == student_id && e.course_id == course_id)
        {
            return Err(CoreError::AlreadyEnrolled(course_id));
        }
        enrollments.push(EnrollmentRow {
            student_id,
            course_id,
            enrolled_at: Utc::now(),
        });
        Ok(())
    }

    async fn remove_enrollment(&self, student_id: Uuid, course_id: Uuid) -> CoreResult<()> {
        self.enrollments
            .write()
            .await
            .retain(|e| !(e.student_id == student_id && e.course_id == course_id));
        Ok(())
    }

    async fn list_enrolled_courses(&self, student_id: Uuid) -> CoreResult<Vec<Course>> {
        let courses = self.courses.read().await;
        let enrollments = self.enrollments.read().await;
        let mut rows: Vec<&EnrollmentRow> = enrollments
            .iter()
            .filter(|e| e.student_id == student_id)
            .collect();
        rows.sort_by_key(|e| e.enrolled_at);
        let mut enrolled = Vec::with_capacity(rows.len());
        for row in rows {
            let course = courses
                .get(&row.course_id)
                .ok_or_else(|| CoreError::Storage(format!("enrollment references missing course {}", row.course_id)))?;
            enrolled.push(course.clone());
        }
        Ok(enrolled)
    }
}

#[async_trait]
impl StudentRepository for MemoryStore {
    async fn insert_student(&self, student: &Student) -> CoreResult<()> {
        let mut students = self.students.write().await;
        if students.values().any(|s| s.email == student.email) {
            return Err(CoreError::DuplicateEmail(student.email.clone()));
        }
        students.insert(student.id, student.clone());
        Ok(())
    }

    async fn get_student(&self, id: Uuid) -> CoreResult<Option<Student>> {
        Ok(self.students.read().await.get(&id).cloned())
    }

    async fn list_students(&self) -> CoreResult<Vec<Student>> {
        let mut all: Vec<Student> = self.students.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        Ok(all)
    }

    async fn student_exists(&self, id: Uuid) -> CoreResult<bool> {
        Ok(self.students.read().await.contains_key(&id))
    }

    async fn count_students(&self) -> CoreResult<i64> {
        Ok(self.students.read().await.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn course(max_seats: i32) -> Course {
        Course::new(Uuid::new_v4(), "Rust 101".into(), None, 4900, max_seats).unwrap()
    }

    #[tokio::test]
    async fn reserve_on_missing_course_is_not_found() {
        let store = MemoryStore::new();
        let err = store.try_reserve_seat(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn reserve_consumes_and_release_returns() {
        let store = MemoryStore::new();
        let c = course(1);
        store.insert_course(&c).await.unwrap();

        assert!(store.try_reserve_seat(c.id).await.unwrap());
        assert!(!store.try_reserve_seat(c.id).await.unwrap());
        assert!(!store.peek_available(c.id).await.unwrap());

        store.release_seat(c.id).await.unwrap();
        assert!(store.peek_available(c.id).await.unwrap());
        // Release at zero stays a no-op.
        store.release_seat(c.id).await.unwrap();
        store.release_seat(c.id).await.unwrap();
        let current = store.get_course(c.id).await.unwrap().unwrap();
        assert_eq!(current.enrolled_count, 0);
    }

    #[tokio::test]
    async fn concurrent_reservations_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        let c = course(3);
        store.insert_course(&c).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let course_id = c.id;
            handles.push(tokio::spawn(async move {
                store.try_reserve_seat(course_id).await.unwrap()
            }));
        }
        let mut won = 0;
        for handle in handles {
            if handle.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 3);
        let current = store.get_course(c.id).await.unwrap().unwrap();
        assert_eq!(current.enrolled_count, 3);
        assert!(!current.is_open);
    }

    #[tokio::test]
    async fn duplicate_cart_line_conflicts() {
        let store = MemoryStore::new();
        let student = Student::new("Ada".into(), "ada@example.com".into()).unwrap();
        store.insert_student(&student).await.unwrap();
        let c = course(5);
        store.insert_course(&c).await.unwrap();

        let cart = store.get_or_create_cart(student.id).await.unwrap();
        store.insert_line(cart.id, c.id).await.unwrap();
        let err = store.insert_line(cart.id, c.id).await.unwrap_err();
        assert!(matches!(err, CoreError::CourseAlreadyInCart(_)));

        let total = store.recompute_total(cart.id).await.unwrap();
        assert_eq!(total, 4900);
    }

    #[tokio::test]
    async fn cart_creation_is_idempotent() {
        let store = MemoryStore::new();
        let student = Student::new("Ada".into(), "ada@example.com".into()).unwrap();
        store.insert_student(&student).await.unwrap();

        let first = store.get_or_create_cart(student.id).await.unwrap();
        let second = store.get_or_create_cart(student.id).await.unwrap();
        assert_eq!(first.id, second.id);

        let err = store.get_or_create_cart(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::StudentNotFound(_)));
    }

    #[tokio::test]
    async fn order_codes_are_unique() {
        let store = MemoryStore::new();
        let c = course(5);
        let order = Order::from_courses(Uuid::new_v4(), &[c]);
        store.insert_order(&order).await.unwrap();

        let mut clash = order.clone();
        clash.id = Uuid::new_v4();
        let err = store.insert_order(&clash).await.unwrap_err();
        assert!(matches!(err, CoreError::DuplicateOrderCode(_)));
    }

    #[tokio::test]
    async fn enrollment_is_unique_per_pair() {
        let store = MemoryStore::new();
        let c = course(5);
        store.insert_course(&c).await.unwrap();
        let student_id = Uuid::new_v4();

        store.add_enrollment(student_id, c.id).await.unwrap();
        let err = store.add_enrollment(student_id, c.id).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyEnrolled(_)));

        let enrolled = store.list_enrolled_courses(student_id).await.unwrap();
        assert_eq!(enrolled.len(), 1);
        assert_eq!(enrolled[0].id, c.id);
    }
}
