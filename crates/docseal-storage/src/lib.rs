//! docseal-storage: OpenDAL blob backend + deterministic storage layout

pub mod health;
pub mod layout;
pub mod operator;

pub use health::{check_health, HealthReport};
pub use layout::{category_prefix, ensure_parent_dir, owner_prefix, resolve_path};
pub use operator::{build_operator, memory_operator};
