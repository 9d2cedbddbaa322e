//! SQLite persistence for canonical survey entities.

mod model;
mod repository;

pub use model::{EntityDB, EntityLinkDB};
pub(crate) use model::{format_timestamp, parse_timestamp, parse_uuid};
pub(crate) use repository::{
    delete_entity, delete_link, get_entity, insert_link, links_from_parent, links_to_child,
    list_entities, load_entities, upsert_entity,
};
pub use repository::EntityRepository;
