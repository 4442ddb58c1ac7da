//! Type-routed object mapping.
//!
//! Routes convert one concrete shape into another. They are either written
//! by hand ([`Mapper::register_route`]) or synthesized from matching field
//! paths ([`Mapper::auto_route`]), and are dispatched by exact type pair
//! ([`Mapper::map`], [`Mapper::map_to`]).
//!
//! ```ignore
//! use automap::{AutoOptions, Mapper, Shape};
//!
//! #[derive(Shape, Default)]
//! struct UserRow { id: i64, name: String, password_hash: String }
//!
//! #[derive(Shape, Default)]
//! struct UserDto { id: i64, display_name: String }
//!
//! let mapper = Mapper::new();
//! mapper.auto_route::<UserRow, UserDto>(
//!     AutoOptions::new()
//!         .field_path("name", "display_name")
//!         .exclude("password_hash"),
//! )?;
//! let dto: UserDto = mapper.map_to(&row)?;
//! let dtos: Vec<UserDto> = mapper.map_to(&rows)?;
//! ```

// Lets `#[derive(Shape)]` output (`automap::...` paths) resolve inside this crate.
extern crate self as automap;

pub mod accessor;
mod auto;
pub mod config;
pub mod error;
pub mod fields;
mod mapper;
pub mod options;
pub mod shape;
pub mod value;

use std::sync::LazyLock;

pub use automap_derive::Shape;
pub use config::MapperConfig;
pub use error::MapError;
pub use fields::{FieldDef, FieldDescriptor, FieldIndex};
pub use mapper::Mapper;
pub use options::AutoOptions;
pub use shape::{Kind, Shape, TypeDescriptor};
pub use value::{FieldValue, Scalar};

static GLOBAL: LazyLock<Mapper> = LazyLock::new(Mapper::new);

/// Process-wide mapper used by the free functions below.
pub fn global() -> &'static Mapper {
    &GLOBAL
}

/// [`Mapper::register_route`] on the [`global`] mapper.
pub fn register_route<S, D, F>(route: F) -> Result<(), MapError>
where
    S: Shape,
    D: Shape,
    F: Fn(&S, &mut D) -> Result<(), MapError> + Send + Sync + 'static,
{
    global().register_route::<S, D, F>(route)
}

/// [`Mapper::auto_route`] on the [`global`] mapper.
pub fn auto_route<S: Shape, D: Shape>(options: AutoOptions<S, D>) -> Result<(), MapError> {
    global().auto_route(options)
}

/// [`Mapper::map`] on the [`global`] mapper.
pub fn map<S: Shape, D: Shape>(source: &S, dest: &mut D) -> Result<(), MapError> {
    global().map(source, dest)
}

/// [`Mapper::map_to`] on the [`global`] mapper.
pub fn map_to<D: Shape, S: Shape>(source: &S) -> Result<D, MapError> {
    global().map_to(source)
}

/// [`Mapper::map_to_partial`] on the [`global`] mapper.
pub fn map_to_partial<D: Shape, S: Shape>(source: &S) -> (D, Result<(), MapError>) {
    global().map_to_partial(source)
}
