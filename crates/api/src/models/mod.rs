//! Domain models returned by repositories and serialized by routes.

pub mod address;
pub mod cart;
pub mod order;
pub mod payment;
pub mod review;
pub mod user;
pub mod variant;

pub use address::{NewAddress, OrderShippingAddress, ShippingAddress};
pub use cart::{Cart, CartItem};
pub use order::{NewOrderItem, Order, OrderItem};
pub use payment::{Payment, PaymentSession};
pub use review::{NewReview, Review, ReviewUpdate};
pub use user::User;
pub use variant::Variant;
