//! Generic resource model shared by every service client.
//!
//! A [`Resource`] wraps the JSON object a service returned for one entity.
//! Each resource type is described by a zero-sized [`ResourceKind`] marker
//! that names it and declares which fields need decoding beyond plain JSON.
//! Fields are read with [`Resource::get`]; missing fields are an error
//! rather than a silent `None`.

use std::any::TypeId;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::datetime::{parse_timestamp, CoercionError, DisplayZone};
use crate::error::{Error, Result};
use crate::exceptions::{ErrorInfo, HttpException};
use crate::meta::{DictWithMeta, ListWithMeta};
use crate::response::{HttpResponse, RequestIdHeaders, ResponseMeta};

/// Name of the identifying field.
pub const ID_FIELD: &str = "id";

/// Anything that can stand in for a resource identifier.
pub trait HasId {
    /// Identifier type.
    type Id;

    /// The identifier: the `id` field when there is one, otherwise the value itself.
    fn get_id(&self) -> Self::Id;
}

/// Resolve an object-or-id reference to the plain identifier.
pub fn getid<T: HasId + ?Sized>(obj: &T) -> T::Id {
    obj.get_id()
}

macro_rules! self_identified {
    ($($ty:ty),* $(,)?) => {
        $(
            impl HasId for $ty {
                type Id = $ty;

                fn get_id(&self) -> $ty {
                    *self
                }
            }
        )*
    };
}

self_identified!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl HasId for String {
    type Id = String;

    fn get_id(&self) -> String {
        self.clone()
    }
}

impl HasId for str {
    type Id = String;

    fn get_id(&self) -> String {
        self.to_string()
    }
}

impl HasId for Value {
    type Id = Value;

    fn get_id(&self) -> Value {
        self.get(ID_FIELD).unwrap_or(self).clone()
    }
}

impl<T: HasId + ?Sized> HasId for &T {
    type Id = T::Id;

    fn get_id(&self) -> T::Id {
        (**self).get_id()
    }
}

/// A resource field after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Undecoded JSON, as the service sent it
    Json(Value),
    /// A timestamp in the display zone
    DateTime(DateTime<FixedOffset>),
}

impl FieldValue {
    /// The raw JSON, unless the field was decoded.
    #[must_use]
    pub const fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::DateTime(_) => None,
        }
    }

    /// The text, when the field is an undecoded JSON string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    /// The timestamp, when the field was decoded as one.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Self::DateTime(value) => Some(value),
            Self::Json(_) => None,
        }
    }

    /// Returns true if the field was decoded as a timestamp.
    #[must_use]
    pub const fn is_datetime(&self) -> bool {
        matches!(self, Self::DateTime(_))
    }

    /// Re-encode as JSON; timestamps become RFC 3339 strings.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::DateTime(value) => Value::String(value.to_rfc3339()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(Value::String(text)) => f.write_str(text),
            Self::Json(value) => write!(f, "{value}"),
            Self::DateTime(value) => write!(f, "{value}"),
        }
    }
}

impl PartialEq<Value> for FieldValue {
    fn eq(&self, other: &Value) -> bool {
        self.as_json() == Some(other)
    }
}

impl PartialEq<&str> for FieldValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// How a declared field is decoded.
#[derive(Debug, Clone, Copy)]
pub enum Coercion {
    /// Parse a timestamp string; see [`parse_timestamp`]
    DateTime,
    /// Caller-supplied decoding
    Custom(fn(&Value) -> std::result::Result<FieldValue, CoercionError>),
}

impl Coercion {
    /// Decode `value`.
    ///
    /// # Errors
    ///
    /// Returns the reason the value could not be decoded.
    pub fn apply(
        self,
        value: &Value,
        zone: DisplayZone,
    ) -> std::result::Result<FieldValue, CoercionError> {
        match self {
            Self::DateTime => {
                let text = value
                    .as_str()
                    .ok_or_else(|| CoercionError::NotAString(value.to_string()))?;
                parse_timestamp(text, zone).map(FieldValue::DateTime)
            }
            Self::Custom(decode) => decode(value),
        }
    }
}

/// A field name paired with its coercion.
#[derive(Debug, Clone, Copy)]
pub struct FieldCoercion {
    /// Field name
    pub field: &'static str,
    /// Decoding applied to the field
    pub coercion: Coercion,
}

impl FieldCoercion {
    /// Decode `field` as a timestamp.
    #[must_use]
    pub const fn datetime(field: &'static str) -> Self {
        Self {
            field,
            coercion: Coercion::DateTime,
        }
    }

    /// Decode `field` with a custom function.
    #[must_use]
    pub const fn custom(
        field: &'static str,
        decode: fn(&Value) -> std::result::Result<FieldValue, CoercionError>,
    ) -> Self {
        Self {
            field,
            coercion: Coercion::Custom(decode),
        }
    }
}

/// Static description of one resource type.
pub trait ResourceKind: 'static {
    /// Type name used in diagnostics.
    const NAME: &'static str;

    /// Fields decoded at construction.
    const COERCIONS: &'static [FieldCoercion] = &[];

    /// Whether [`Resource::human_id`] is derived for this type.
    const HUMAN_ID: bool = false;

    /// Field the human ID is derived from.
    const NAME_ATTR: &'static str = "name";

    /// Coercion declared for `field`, if any.
    #[must_use]
    fn coercion_for(field: &str) -> Option<Coercion> {
        Self::COERCIONS
            .iter()
            .find(|declared| declared.field == field)
            .map(|declared| declared.coercion)
    }
}

/// Kind for resources with no declared fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericResource;

impl ResourceKind for GenericResource {
    const NAME: &'static str = "Resource";
}

/// Service-side operations a resource relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Manager: Send + Sync {
    /// Fetch the current representation of the resource with `id`.
    ///
    /// A vanished resource must be reported as a 404 classification so
    /// callers can tell it apart from other failures.
    async fn get(&self, id: &Value) -> Result<DictWithMeta>;
}

/// A service entity backed by its JSON representation.
pub struct Resource<K: ResourceKind = GenericResource> {
    manager: Option<Arc<dyn Manager>>,
    info: Map<String, Value>,
    fields: BTreeMap<String, FieldValue>,
    loaded: bool,
    request_ids: Vec<String>,
    zone: DisplayZone,
    kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> Resource<K> {
    /// Wrap `info` with the default configuration.
    #[must_use]
    pub fn new(manager: Option<Arc<dyn Manager>>, info: Map<String, Value>) -> Self {
        let mut builder = Self::builder(info);
        builder.manager = manager;
        builder.build()
    }

    /// Wrap a decoded response body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidResponse`] if `body` is not a JSON object.
    pub fn from_value(manager: Option<Arc<dyn Manager>>, body: Value) -> Result<Self> {
        match body {
            Value::Object(info) => Ok(Self::new(manager, info)),
            other => Err(Error::InvalidResponse(format!(
                "{} body must be an object, got {other}",
                K::NAME
            ))),
        }
    }

    /// Start building a resource from `info`.
    #[must_use]
    pub fn builder(info: Map<String, Value>) -> ResourceBuilder<K> {
        ResourceBuilder::new(info)
    }

    /// The coerced field `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeNotFound`] if the field is absent.
    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        self.fields.get(name).ok_or_else(|| Error::AttributeNotFound {
            resource: K::NAME.to_string(),
            attribute: name.to_string(),
        })
    }

    /// The coerced field `name`, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// The field `name` as text, if present and a string.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_str)
    }

    /// The field `name` as a timestamp, if present and decoded as one.
    #[must_use]
    pub fn get_datetime(&self, name: &str) -> Option<&DateTime<FixedOffset>> {
        self.field(name).and_then(FieldValue::as_datetime)
    }

    /// All coerced fields, sorted by name.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// The raw `id` field.
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.info.get(ID_FIELD)
    }

    /// The raw mapping the resource was built from.
    #[must_use]
    pub const fn info(&self) -> &Map<String, Value> {
        &self.info
    }

    /// A copy of the raw mapping.
    #[must_use]
    pub fn to_dict(&self) -> Map<String, Value> {
        self.info.clone()
    }

    /// Request IDs of every response that contributed to this resource.
    #[must_use]
    pub fn request_ids(&self) -> &[String] {
        &self.request_ids
    }

    /// Whether the full representation has been fetched.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Mark the representation as complete or partial.
    pub fn set_loaded(&mut self, loaded: bool) {
        self.loaded = loaded;
    }

    /// The manager this resource refreshes through.
    #[must_use]
    pub fn manager(&self) -> Option<&Arc<dyn Manager>> {
        self.manager.as_ref()
    }

    /// URL-friendly slug of the name field, for kinds that opt in.
    #[must_use]
    pub fn human_id(&self) -> Option<String> {
        if !K::HUMAN_ID {
            return None;
        }
        self.info
            .get(K::NAME_ATTR)
            .and_then(Value::as_str)
            .map(slugify)
    }

    /// Returns true if every filter key is present with an equal raw value.
    #[must_use]
    pub fn matches(&self, filters: &Map<String, Value>) -> bool {
        filters
            .iter()
            .all(|(key, expected)| self.info.get(key) == Some(expected))
    }

    /// `<Name field=value, ...>` with fields sorted by name.
    #[must_use]
    pub fn human_repr(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("<{} {fields}>", K::NAME)
    }

    /// Fetch the resource again and replace its contents.
    ///
    /// Returns `Ok(None)` when the service no longer knows the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no manager or `id`, or the manager fails
    /// for any reason other than the resource being gone.
    pub async fn refresh(&mut self) -> Result<Option<&mut Self>> {
        let manager = self
            .manager
            .clone()
            .ok_or_else(|| Error::MissingManager(self.human_repr()))?;
        let id = self
            .id()
            .cloned()
            .ok_or_else(|| Error::MissingId(self.human_repr()))?;

        match manager.get(&id).await {
            Ok(fresh) => {
                let (info, request_ids) = fresh.into_parts();
                self.fields = coerce::<K>(&info, self.zone);
                self.info = info;
                self.request_ids.extend(request_ids);
                self.loaded = true;
                Ok(Some(self))
            }
            Err(err) if err.is_not_found() => {
                info!(resource = K::NAME, %id, "resource no longer exists");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Like [`get`](Self::get), but fetches the full representation first
    /// when the field is missing from a partially loaded resource.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AttributeNotFound`] if the field is still absent, or
    /// the manager's error if the fetch fails.
    pub async fn get_or_load(&mut self, name: &str) -> Result<&FieldValue> {
        if !self.fields.contains_key(name) && !self.loaded {
            self.loaded = true;
            if self.manager.is_some() && self.id().is_some() {
                self.refresh().await?;
            }
        }
        self.get(name)
    }
}

impl<K: ResourceKind> Clone for Resource<K> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            info: self.info.clone(),
            fields: self.fields.clone(),
            loaded: self.loaded,
            request_ids: self.request_ids.clone(),
            zone: self.zone,
            kind: PhantomData,
        }
    }
}

impl<K: ResourceKind> fmt::Display for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.human_repr())
    }
}

impl<K: ResourceKind> fmt::Debug for Resource<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(K::NAME)
            .field("info", &self.info)
            .field("loaded", &self.loaded)
            .field("request_ids", &self.request_ids)
            .finish_non_exhaustive()
    }
}

// Kinds must match; then ids decide, or the whole mapping when neither has one.
impl<A: ResourceKind, B: ResourceKind> PartialEq<Resource<B>> for Resource<A> {
    fn eq(&self, other: &Resource<B>) -> bool {
        if TypeId::of::<A>() != TypeId::of::<B>() {
            return false;
        }
        match (self.id(), other.id()) {
            (Some(left), Some(right)) => left == right,
            (None, None) => self.info == other.info,
            _ => false,
        }
    }
}

impl<K: ResourceKind> HasId for Resource<K> {
    type Id = Value;

    fn get_id(&self) -> Value {
        self.id()
            .cloned()
            .unwrap_or_else(|| Value::Object(self.info.clone()))
    }
}

/// Where recorded request IDs come from, resolved at build time.
enum RequestIdSource {
    Response(ResponseMeta),
    Ids(Vec<String>),
}

/// Builder for [`Resource`].
///
/// Request IDs are read from recorded responses when the resource is built,
/// using the header names in effect at that point.
pub struct ResourceBuilder<K: ResourceKind> {
    manager: Option<Arc<dyn Manager>>,
    info: Map<String, Value>,
    loaded: bool,
    request_ids: Vec<RequestIdSource>,
    headers: RequestIdHeaders,
    zone: DisplayZone,
    kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> ResourceBuilder<K> {
    fn new(info: Map<String, Value>) -> Self {
        Self {
            manager: None,
            info,
            loaded: false,
            request_ids: Vec::new(),
            headers: RequestIdHeaders::default(),
            zone: DisplayZone::default(),
            kind: PhantomData,
        }
    }

    /// Refresh through `manager`.
    #[must_use]
    pub fn manager(mut self, manager: Arc<dyn Manager>) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Mark the representation as complete.
    #[must_use]
    pub const fn loaded(mut self, loaded: bool) -> Self {
        self.loaded = loaded;
        self
    }

    /// Apply header names and display zone from `config`.
    #[must_use]
    pub fn config(mut self, config: &ModelConfig) -> Self {
        self.headers = config.request_id_headers();
        self.zone = config.display_zone();
        self
    }

    /// Show datetime fields in `zone`.
    #[must_use]
    pub const fn zone(mut self, zone: DisplayZone) -> Self {
        self.zone = zone;
        self
    }

    /// Record the request IDs carried by `response`.
    #[must_use]
    pub fn response<R: HttpResponse + ?Sized>(mut self, response: &R) -> Self {
        self.request_ids.push(RequestIdSource::Response(response.snapshot()));
        self
    }

    /// Record request IDs directly.
    #[must_use]
    pub fn request_ids(mut self, request_ids: Vec<String>) -> Self {
        self.request_ids.push(RequestIdSource::Ids(request_ids));
        self
    }

    /// Coerce declared fields and build the resource.
    #[must_use]
    pub fn build(self) -> Resource<K> {
        let headers = self.headers;
        let request_ids = self
            .request_ids
            .into_iter()
            .flat_map(|source| match source {
                RequestIdSource::Response(response) => headers.request_ids(&response),
                RequestIdSource::Ids(ids) => ids,
            })
            .collect();

        Resource {
            fields: coerce::<K>(&self.info, self.zone),
            manager: self.manager,
            info: self.info,
            loaded: self.loaded,
            request_ids,
            zone: self.zone,
            kind: PhantomData,
        }
    }
}

fn coerce<K: ResourceKind>(
    info: &Map<String, Value>,
    zone: DisplayZone,
) -> BTreeMap<String, FieldValue> {
    info.iter()
        .map(|(name, raw)| {
            let value = match K::coercion_for(name) {
                Some(coercion) => coercion.apply(raw, zone).unwrap_or_else(|err| {
                    debug!(resource = K::NAME, field = %name, "keeping raw value: {err}");
                    FieldValue::Json(raw.clone())
                }),
                None => FieldValue::Json(raw.clone()),
            };
            (name.clone(), value)
        })
        .collect()
}

fn slugify(value: &str) -> String {
    let cleaned = value
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace() || matches!(ch, '_' | '-'))
        .collect::<String>()
        .trim()
        .to_lowercase();

    let mut slug = String::with_capacity(cleaned.len());
    let mut pending_dash = false;
    for ch in cleaned.chars() {
        if ch == '-' || ch.is_whitespace() {
            pending_dash = true;
            continue;
        }
        if pending_dash {
            slug.push('-');
            pending_dash = false;
        }
        slug.push(ch);
    }
    if pending_dash {
        slug.push('-');
    }
    slug
}

/// A manager that can enumerate its resources.
#[async_trait]
pub trait ManagerWithFind<K: ResourceKind>: Send + Sync {
    /// Every resource visible to the caller.
    async fn list(&self) -> Result<ListWithMeta<Resource<K>>>;

    /// Resources whose raw fields equal every filter value.
    ///
    /// # Errors
    ///
    /// Returns the error from [`list`](Self::list).
    async fn findall(&self, filters: &Map<String, Value>) -> Result<Vec<Resource<K>>> {
        let listed = self.list().await?;
        Ok(listed
            .into_inner()
            .into_iter()
            .filter(|resource| resource.matches(filters))
            .collect())
    }

    /// The single resource matching `filters`.
    ///
    /// # Errors
    ///
    /// Returns a 404 [`HttpException::NotFound`] when nothing matches and
    /// [`Error::NoUniqueMatch`] when several resources do.
    async fn find(&self, filters: &Map<String, Value>) -> Result<Resource<K>> {
        let mut found = self.findall(filters).await?;
        match found.len() {
            0 => {
                let message = format!(
                    "No {} matching {}.",
                    K::NAME,
                    Value::Object(filters.clone())
                );
                Err(HttpException::NotFound(ErrorInfo::new(404, message)).into())
            }
            1 => Ok(found.remove(0)),
            count => Err(Error::NoUniqueMatch(format!(
                "{count} {} resources match {}",
                K::NAME,
                Value::Object(filters.clone())
            ))),
        }
    }
}
