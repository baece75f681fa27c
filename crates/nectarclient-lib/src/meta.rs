//! Values tagged with the request IDs of the response they came from.
//!
//! [`WithMeta`] reads exactly like the value it wraps: it dereferences to
//! it, compares equal to it, iterates like it and prints like it. The only
//! addition is [`WithMeta::request_ids`], fixed at construction.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::response::{request_ids, HttpResponse};

/// A value plus the request IDs of the response that produced it.
#[derive(Debug, Clone, Default)]
pub struct WithMeta<T> {
    value: T,
    request_ids: Vec<String>,
}

/// Ordered sequence with request IDs.
pub type ListWithMeta<T> = WithMeta<Vec<T>>;

/// JSON object with request IDs.
pub type DictWithMeta = WithMeta<Map<String, Value>>;

/// Key-value mapping with request IDs.
pub type MapWithMeta<K, V> = WithMeta<BTreeMap<K, V>>;

/// Pair with request IDs.
pub type TupleWithMeta<A, B> = WithMeta<(A, B)>;

/// Text with request IDs.
pub type StrWithMeta = WithMeta<String>;

/// Bytes with request IDs.
pub type BytesWithMeta = WithMeta<Vec<u8>>;

impl<T> WithMeta<T> {
    /// Tag `value` with explicit request IDs.
    #[must_use]
    pub fn new(value: T, request_ids: Vec<String>) -> Self {
        Self { value, request_ids }
    }

    /// Tag `value` with the request IDs found in `response`.
    #[must_use]
    pub fn from_response<R: HttpResponse + ?Sized>(value: T, response: &R) -> Self {
        Self::new(value, request_ids(response))
    }

    /// Request IDs of the originating response.
    #[must_use]
    pub fn request_ids(&self) -> &[String] {
        &self.request_ids
    }

    /// The wrapped value.
    #[must_use]
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Discard the request IDs.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Split into the value and its request IDs.
    #[must_use]
    pub fn into_parts(self) -> (T, Vec<String>) {
        (self.value, self.request_ids)
    }

    /// Transform the value, keeping the request IDs.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> WithMeta<U>
    where
        F: FnOnce(T) -> U,
    {
        WithMeta {
            value: f(self.value),
            request_ids: self.request_ids,
        }
    }
}

impl<T> Deref for WithMeta<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> AsRef<T> for WithMeta<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

// Request IDs take no part in equality.
impl<T: PartialEq> PartialEq for WithMeta<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for WithMeta<T> {}

impl<T: PartialEq> PartialEq<T> for WithMeta<T> {
    fn eq(&self, other: &T) -> bool {
        self.value == *other
    }
}

impl PartialEq<str> for WithMeta<String> {
    fn eq(&self, other: &str) -> bool {
        self.value == other
    }
}

impl PartialEq<&str> for WithMeta<String> {
    fn eq(&self, other: &&str) -> bool {
        self.value == *other
    }
}

impl PartialEq<[u8]> for WithMeta<Vec<u8>> {
    fn eq(&self, other: &[u8]) -> bool {
        self.value == other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for WithMeta<Vec<u8>> {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.value.as_slice() == other.as_slice()
    }
}

impl<T: fmt::Display> fmt::Display for WithMeta<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

// Serializes as the bare value; request IDs are transport metadata.
impl<T: Serialize> Serialize for WithMeta<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<T> IntoIterator for WithMeta<T>
where
    T: IntoIterator,
{
    type Item = T::Item;
    type IntoIter = T::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.value.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a WithMeta<T>
where
    &'a T: IntoIterator,
{
    type Item = <&'a T as IntoIterator>::Item;
    type IntoIter = <&'a T as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        (&self.value).into_iter()
    }
}
