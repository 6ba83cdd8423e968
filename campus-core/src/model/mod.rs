pub mod cart;
pub mod course;
pub mod order;
pub mod student;

pub use cart::{Cart, CartLine};
pub use course::Course;
pub use order::{Order, OrderLine, OrderStatus};
pub use student::Student;
