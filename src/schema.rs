//! Protocol schema model and validation.
//!
//! A protocol definition names its messages and the two envelope
//! messages, `ClientToServer` and `ServerToClient`, that wrap them.
//! Each envelope must contain exactly one choice group called
//! `messages` and nothing else; everything the engine assumes about
//! dispatch rests on that shape, so it is validated up front. Code
//! generation itself is behind the [`GenerationBackend`] trait and not
//! part of this crate.

use std::path::PathBuf;

use crate::error::SchemaError;

/// Required name of the client-to-server envelope message.
pub const CLIENT_TO_SERVER: &str = "ClientToServer";

/// Required name of the server-to-client envelope message.
pub const SERVER_TO_CLIENT: &str = "ServerToClient";

/// Required name of the choice group inside each envelope.
pub const CHOICE_GROUP: &str = "messages";

/// A plain field in a message definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub type_name: String,
}

/// A choice group: at most one of its variants is set at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceGroupDef {
    pub name: String,
    /// Variant names, each referring to a message type.
    pub variants: Vec<String>,
}

/// A message type in a protocol definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub choice_groups: Vec<ChoiceGroupDef>,
}

impl MessageDef {
    /// A message with plain fields only.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
            choice_groups: Vec::new(),
        }
    }

    /// A message holding a single choice group.
    pub fn envelope(name: impl Into<String>, group: ChoiceGroupDef) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            choice_groups: vec![group],
        }
    }
}

/// One validated direction of a protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeDef {
    /// Envelope message name ([`CLIENT_TO_SERVER`] or [`SERVER_TO_CLIENT`]).
    pub message: String,
    /// Variant names of the `messages` choice group, in declaration order.
    pub variants: Vec<String>,
}

/// A validated protocol schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub name: String,
    pub client_to_server: EnvelopeDef,
    pub server_to_client: EnvelopeDef,
    /// All message definitions, envelopes included.
    pub messages: Vec<MessageDef>,
}

impl Schema {
    /// Validate message definitions into a schema.
    ///
    /// # Errors
    ///
    /// Fails if either envelope message is missing, carries anything
    /// besides exactly one choice group, or names that group something
    /// other than `messages`. A schema error is fatal at generation
    /// time; it never occurs at runtime.
    pub fn from_messages(
        name: impl Into<String>,
        messages: Vec<MessageDef>,
    ) -> Result<Self, SchemaError> {
        let client_to_server = validate_envelope(&messages, CLIENT_TO_SERVER)?;
        let server_to_client = validate_envelope(&messages, SERVER_TO_CLIENT)?;

        Ok(Self {
            name: name.into(),
            client_to_server,
            server_to_client,
            messages,
        })
    }
}

fn validate_envelope(
    messages: &[MessageDef],
    envelope_name: &str,
) -> Result<EnvelopeDef, SchemaError> {
    let message = messages
        .iter()
        .find(|message| message.name == envelope_name)
        .ok_or_else(|| SchemaError::MissingEnvelope(envelope_name.to_string()))?;

    if !message.fields.is_empty() || message.choice_groups.len() != 1 {
        return Err(SchemaError::NotExactlyOneChoice(envelope_name.to_string()));
    }

    let group = &message.choice_groups[0];
    if group.name != CHOICE_GROUP {
        return Err(SchemaError::BadChoiceName(
            envelope_name.to_string(),
            group.name.clone(),
        ));
    }

    Ok(EnvelopeDef {
        message: message.name.clone(),
        variants: group.variants.clone(),
    })
}

/// Which side of the protocol to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// Language a backend emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLanguage {
    C,
    Python,
    Rust,
}

/// Runtime environment a backend targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Async,
}

/// Everything a backend needs to know about its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProfile {
    pub language: TargetLanguage,
    pub platform: Platform,
    pub side: Side,
}

/// A file produced by a generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

/// Emits protocol bindings for a validated schema.
///
/// Implementations live outside this crate; the engine only defines
/// the contract they generate against.
pub trait GenerationBackend {
    fn generate(
        &self,
        schema: &Schema,
        profile: &TargetProfile,
    ) -> Result<Vec<GeneratedFile>, SchemaError>;
}
