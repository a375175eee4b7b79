//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod order;
pub mod order_item;
pub mod post;
pub mod product;
pub mod review;
pub mod service_request;
pub mod session;
pub mod system_state;
pub mod user;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel, OrderStatus};
pub use order_item::{Column as OrderItemColumn, Entity as OrderItem, Model as OrderItemModel};
pub use post::{Column as PostColumn, Entity as Post, Model as PostModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use review::{Column as ReviewColumn, Entity as Review, Model as ReviewModel};
pub use service_request::{
    Column as ServiceRequestColumn, Entity as ServiceRequest, Model as ServiceRequestModel,
    RequestStatus,
};
pub use session::{Column as SessionColumn, Entity as Session, Model as SessionModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel, Role};
