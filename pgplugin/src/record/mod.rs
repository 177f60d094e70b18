//! Record data model.
//!
//! Records are owned values handed over by the [`RecordStore`](crate::store::RecordStore).
//! The kinds the engine understands form a closed enumeration ([`RecordBody`]);
//! [`model_slots`] is the single dispatch table mapping each kind to the
//! models it carries.

mod body;
mod key;
mod model;
mod slots;

pub use body::{ModeledKind, Record, RecordBody, TEXTURE_SLOT_COUNT};
pub use key::{ContainerKey, LocalId, RecordKey, MAX_LOCAL_ID};
pub use model::{AlternateTexture, ArmorModel, Gendered, Model, SlotTag};
pub use slots::{model_slots, model_slots_mut, slot, slot_mut};
