//! Model-slot extraction.
//!
//! One dispatch table maps each record kind to the models it carries and the
//! [`SlotTag`] that addresses each of them. Absent sub-objects are skipped.

use super::body::RecordBody;
use super::model::{Model, SlotTag};

/// Models of a record in slot order.
pub fn model_slots(body: &RecordBody) -> Vec<(&Model, SlotTag)> {
    let mut slots = Vec::new();

    match body {
        RecordBody::Armor { world_model } => {
            if let Some(world) = world_model {
                if let Some(model) = world.male.as_ref().and_then(|m| m.model.as_ref()) {
                    slots.push((model, SlotTag::Male));
                }
                if let Some(model) = world.female.as_ref().and_then(|m| m.model.as_ref()) {
                    slots.push((model, SlotTag::Female));
                }
            }
        }
        RecordBody::ArmorAddon {
            world_model,
            first_person,
        } => {
            if let Some(world) = world_model {
                if let Some(model) = world.male.as_ref() {
                    slots.push((model, SlotTag::Male));
                }
                if let Some(model) = world.female.as_ref() {
                    slots.push((model, SlotTag::Female));
                }
            }
            if let Some(first) = first_person {
                if let Some(model) = first.male.as_ref() {
                    slots.push((model, SlotTag::FirstPersonMale));
                }
                if let Some(model) = first.female.as_ref() {
                    slots.push((model, SlotTag::FirstPersonFemale));
                }
            }
        }
        RecordBody::Modeled { model, .. } => {
            if let Some(model) = model {
                slots.push((model, SlotTag::Primary));
            }
        }
        RecordBody::TextureSet { .. } | RecordBody::Other => {}
    }

    slots
}

/// Mutable twin of [`model_slots`].
pub fn model_slots_mut(body: &mut RecordBody) -> Vec<(&mut Model, SlotTag)> {
    let mut slots = Vec::new();

    match body {
        RecordBody::Armor { world_model } => {
            if let Some(world) = world_model {
                if let Some(model) = world.male.as_mut().and_then(|m| m.model.as_mut()) {
                    slots.push((model, SlotTag::Male));
                }
                if let Some(model) = world.female.as_mut().and_then(|m| m.model.as_mut()) {
                    slots.push((model, SlotTag::Female));
                }
            }
        }
        RecordBody::ArmorAddon {
            world_model,
            first_person,
        } => {
            if let Some(world) = world_model {
                if let Some(model) = world.male.as_mut() {
                    slots.push((model, SlotTag::Male));
                }
                if let Some(model) = world.female.as_mut() {
                    slots.push((model, SlotTag::Female));
                }
            }
            if let Some(first) = first_person {
                if let Some(model) = first.male.as_mut() {
                    slots.push((model, SlotTag::FirstPersonMale));
                }
                if let Some(model) = first.female.as_mut() {
                    slots.push((model, SlotTag::FirstPersonFemale));
                }
            }
        }
        RecordBody::Modeled { model, .. } => {
            if let Some(model) = model {
                slots.push((model, SlotTag::Primary));
            }
        }
        RecordBody::TextureSet { .. } | RecordBody::Other => {}
    }

    slots
}

/// The model addressed by `tag`, if the record has it.
pub fn slot(body: &RecordBody, tag: SlotTag) -> Option<&Model> {
    model_slots(body)
        .into_iter()
        .find_map(|(model, t)| (t == tag).then_some(model))
}

/// Mutable access to the model addressed by `tag`.
pub fn slot_mut(body: &mut RecordBody, tag: SlotTag) -> Option<&mut Model> {
    model_slots_mut(body)
        .into_iter()
        .find_map(|(model, t)| (t == tag).then_some(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ArmorModel, Gendered, ModeledKind};

    fn tags(body: &RecordBody) -> Vec<SlotTag> {
        model_slots(body).into_iter().map(|(_, tag)| tag).collect()
    }

    #[test]
    fn test_armor_yields_gendered_slots() {
        let body = RecordBody::Armor {
            world_model: Some(Gendered::new(
                Some(ArmorModel::new(Model::new("armor\\m.nif"))),
                Some(ArmorModel::new(Model::new("armor\\f.nif"))),
            )),
        };
        assert_eq!(tags(&body), vec![SlotTag::Male, SlotTag::Female]);
    }

    #[test]
    fn test_armor_wrapper_without_model_is_skipped() {
        let body = RecordBody::Armor {
            world_model: Some(Gendered::new(
                Some(ArmorModel { model: None }),
                Some(ArmorModel::new(Model::new("armor\\f.nif"))),
            )),
        };
        assert_eq!(tags(&body), vec![SlotTag::Female]);
    }

    #[test]
    fn test_armor_addon_yields_four_slots() {
        let body = RecordBody::ArmorAddon {
            world_model: Some(Gendered::new(
                Some(Model::new("a_0.nif")),
                Some(Model::new("b_0.nif")),
            )),
            first_person: Some(Gendered::new(
                Some(Model::new("1st_m.nif")),
                Some(Model::new("1st_f.nif")),
            )),
        };
        assert_eq!(
            tags(&body),
            vec![
                SlotTag::Male,
                SlotTag::Female,
                SlotTag::FirstPersonMale,
                SlotTag::FirstPersonFemale
            ]
        );
    }

    #[test]
    fn test_modeled_yields_primary() {
        let body = RecordBody::Modeled {
            kind: ModeledKind::Weapon,
            model: Some(Model::new("weapons\\sword.nif")),
            material: None,
            single_pass: false,
        };
        assert_eq!(tags(&body), vec![SlotTag::Primary]);
    }

    #[test]
    fn test_shapeless_records_yield_nothing() {
        assert!(tags(&RecordBody::Other).is_empty());
        let no_model = RecordBody::Modeled {
            kind: ModeledKind::Light,
            model: None,
            material: None,
            single_pass: false,
        };
        assert!(tags(&no_model).is_empty());
    }

    #[test]
    fn test_slot_mut_edits_the_right_model() {
        let mut body = RecordBody::ArmorAddon {
            world_model: Some(Gendered::new(
                Some(Model::new("m.nif")),
                Some(Model::new("f.nif")),
            )),
            first_person: None,
        };

        slot_mut(&mut body, SlotTag::Female).unwrap().file = "f2.nif".to_string();

        assert_eq!(slot(&body, SlotTag::Male).unwrap().file, "m.nif");
        assert_eq!(slot(&body, SlotTag::Female).unwrap().file, "f2.nif");
        assert!(slot(&body, SlotTag::FirstPersonMale).is_none());
    }
}
