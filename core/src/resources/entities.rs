//! Entities: the legal owners of accounts.
//!
//! On the wire an entity names its `structure` and carries one matching
//! sub-object (`corporation`, `natural_person`, ...) with the others null.
//! Decoding folds that into [`EntityDetails`] and rejects payloads where
//! the two disagree.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::client::{require_id, Call, Client};
use crate::codec::{encode_body, Extras};
use crate::error::Result;
use crate::field::Field;
use crate::macros::{impl_params, impl_service, string_enum};
use crate::options::RequestOptions;
use crate::pagination::{AutoPager, Page, PageRequest};
use crate::resources::shared::{CreatedAtFilter, InFilter, ObjectType};

string_enum! {
    pub enum EntityStructure {
        Corporation => "corporation",
        NaturalPerson => "natural_person",
        Joint => "joint",
        Trust => "trust",
        GovernmentAuthority => "government_authority",
    }
}

string_enum! {
    pub enum EntityStatus {
        Active => "active",
        Archived => "archived",
        Disabled => "disabled",
    }
}

string_enum! {
    pub enum TrustCategory {
        Revocable => "revocable",
        Irrevocable => "irrevocable",
    }
}

string_enum! {
    /// How a beneficial owner qualifies as one.
    pub enum BeneficialOwnerProng {
        Ownership => "ownership",
        Control => "control",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub line2: Field<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(flatten)]
    pub extra: Extras,
}

/// A person, either on their own or as part of a larger entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub name: String,
    pub date_of_birth: NaiveDate,
    pub address: Address,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeneficialOwner {
    pub individual: Individual,
    #[serde(default)]
    pub prongs: Vec<BeneficialOwnerProng>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub company_title: Field<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Corporation {
    pub name: String,
    pub address: Address,
    #[serde(default)]
    pub beneficial_owners: Vec<BeneficialOwner>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub incorporation_state: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub tax_identifier: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub website: Field<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub name: Field<String>,
    pub individuals: Vec<Individual>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trust {
    pub name: String,
    pub category: TrustCategory,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub formation_state: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub tax_identifier: Field<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernmentAuthority {
    pub name: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub tax_identifier: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub website: Field<String>,
    #[serde(flatten)]
    pub extra: Extras,
}

/// The structure-specific part of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDetails {
    Corporation(Corporation),
    NaturalPerson(Individual),
    Joint(Joint),
    Trust(Trust),
    GovernmentAuthority(GovernmentAuthority),
    /// A structure this client does not model; its object stays in `Entity::extra`.
    Other(String),
}

impl EntityDetails {
    pub fn structure(&self) -> EntityStructure {
        match self {
            EntityDetails::Corporation(_) => EntityStructure::Corporation,
            EntityDetails::NaturalPerson(_) => EntityStructure::NaturalPerson,
            EntityDetails::Joint(_) => EntityStructure::Joint,
            EntityDetails::Trust(_) => EntityStructure::Trust,
            EntityDetails::GovernmentAuthority(_) => EntityStructure::GovernmentAuthority,
            EntityDetails::Other(name) => EntityStructure::Other(name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntityWire", into = "EntityWire")]
pub struct Entity {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    pub idempotency_key: Option<String>,
    pub status: EntityStatus,
    pub details: EntityDetails,
    pub kind: ObjectType,
    pub extra: Extras,
}

impl Entity {
    pub fn structure(&self) -> EntityStructure {
        self.details.structure()
    }
}

#[derive(Serialize, Deserialize)]
struct EntityWire {
    id: String,
    created_at: DateTime<Utc>,
    description: Option<String>,
    idempotency_key: Option<String>,
    status: EntityStatus,
    structure: EntityStructure,
    #[serde(default)]
    corporation: Option<Corporation>,
    #[serde(default)]
    natural_person: Option<Individual>,
    #[serde(default)]
    joint: Option<Joint>,
    #[serde(default)]
    trust: Option<Trust>,
    #[serde(default)]
    government_authority: Option<GovernmentAuthority>,
    #[serde(rename = "type")]
    kind: ObjectType,
    #[serde(flatten)]
    extra: Extras,
}

impl TryFrom<EntityWire> for Entity {
    type Error = String;

    fn try_from(wire: EntityWire) -> Result<Self, String> {
        let present = [
            wire.corporation.is_some(),
            wire.natural_person.is_some(),
            wire.joint.is_some(),
            wire.trust.is_some(),
            wire.government_authority.is_some(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count();
        if present > 1 {
            return Err(format!("entity carries {present} structure objects, expected one"));
        }

        let label = wire.structure.to_string();
        let details = match wire.structure {
            EntityStructure::Corporation => wire.corporation.map(EntityDetails::Corporation),
            EntityStructure::NaturalPerson => wire.natural_person.map(EntityDetails::NaturalPerson),
            EntityStructure::Joint => wire.joint.map(EntityDetails::Joint),
            EntityStructure::Trust => wire.trust.map(EntityDetails::Trust),
            EntityStructure::GovernmentAuthority => {
                wire.government_authority.map(EntityDetails::GovernmentAuthority)
            }
            EntityStructure::Other(name) => (present == 0).then_some(EntityDetails::Other(name)),
        }
        .ok_or_else(|| format!("structure `{label}` does not match the entity's details"))?;

        Ok(Entity {
            id: wire.id,
            created_at: wire.created_at,
            description: wire.description,
            idempotency_key: wire.idempotency_key,
            status: wire.status,
            details,
            kind: wire.kind,
            extra: wire.extra,
        })
    }
}

impl From<Entity> for EntityWire {
    fn from(entity: Entity) -> Self {
        let mut wire = EntityWire {
            id: entity.id,
            created_at: entity.created_at,
            description: entity.description,
            idempotency_key: entity.idempotency_key,
            status: entity.status,
            structure: entity.details.structure(),
            corporation: None,
            natural_person: None,
            joint: None,
            trust: None,
            government_authority: None,
            kind: entity.kind,
            extra: entity.extra,
        };
        match entity.details {
            EntityDetails::Corporation(details) => wire.corporation = Some(details),
            EntityDetails::NaturalPerson(details) => wire.natural_person = Some(details),
            EntityDetails::Joint(details) => wire.joint = Some(details),
            EntityDetails::Trust(details) => wire.trust = Some(details),
            EntityDetails::GovernmentAuthority(details) => wire.government_authority = Some(details),
            EntityDetails::Other(_) => {}
        }
        wire
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityCreateParams {
    pub structure: EntityStructure,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub corporation: Field<Corporation>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub natural_person: Field<Individual>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub joint: Field<Joint>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub trust: Field<Trust>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub government_authority: Field<GovernmentAuthority>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub description: Field<String>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl EntityCreateParams {
    fn with_structure(structure: EntityStructure) -> Self {
        Self {
            structure,
            corporation: Field::default(),
            natural_person: Field::default(),
            joint: Field::default(),
            trust: Field::default(),
            government_authority: Field::default(),
            description: Field::default(),
            extra_fields: Extras::new(),
        }
    }

    pub fn corporation(details: Corporation) -> Self {
        Self {
            corporation: Field::value(details),
            ..Self::with_structure(EntityStructure::Corporation)
        }
    }

    pub fn natural_person(details: Individual) -> Self {
        Self {
            natural_person: Field::value(details),
            ..Self::with_structure(EntityStructure::NaturalPerson)
        }
    }

    pub fn joint(details: Joint) -> Self {
        Self {
            joint: Field::value(details),
            ..Self::with_structure(EntityStructure::Joint)
        }
    }

    pub fn trust(details: Trust) -> Self {
        Self {
            trust: Field::value(details),
            ..Self::with_structure(EntityStructure::Trust)
        }
    }

    pub fn government_authority(details: GovernmentAuthority) -> Self {
        Self {
            government_authority: Field::value(details),
            ..Self::with_structure(EntityStructure::GovernmentAuthority)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityListParams {
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub cursor: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub limit: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub idempotency_key: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub status: Field<InFilter<EntityStatus>>,
    #[serde(default, skip_serializing_if = "Field::is_omitted")]
    pub created_at: Field<CreatedAtFilter>,
    #[serde(skip)]
    pub extra_fields: Extras,
}

impl_params!(EntityCreateParams, EntityListParams);

#[derive(Debug, Clone)]
pub struct EntityService {
    client: Client,
    options: RequestOptions,
}

impl_service!(EntityService);

impl EntityService {
    pub fn create(&self, params: &EntityCreateParams) -> Result<Entity> {
        let call = Call::post("/entities").with_body(encode_body(params)?);
        self.client.execute(&call, &self.options)
    }

    pub fn get(&self, entity_id: &str) -> Result<Entity> {
        let id = require_id("entity_id", entity_id)?;
        self.client.execute(&Call::get(format!("/entities/{id}")), &self.options)
    }

    pub fn list(&self, params: &EntityListParams) -> Result<Page<Entity>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        self.client.execute_page("/entities", query, &self.options)
    }

    pub fn list_auto_paging(&self, params: &EntityListParams) -> Result<AutoPager<Entity>> {
        let query = self.client.resolve(&self.options).query_encoder.encode(params)?;
        let request = PageRequest::new(self.client.clone(), "/entities".into(), query, self.options.clone());
        Ok(AutoPager::new(request))
    }

    /// Archive an entity whose accounts are all closed.
    pub fn archive(&self, entity_id: &str) -> Result<Entity> {
        let id = require_id("entity_id", entity_id)?;
        self.client
            .execute(&Call::post(format!("/entities/{id}/archive")), &self.options)
    }
}
