//! Request descriptors: what to address, how to shape the query, and which
//! headers to derive.
//!
//! A [`Request`] is built per call, handed to [`compose`](crate::compose)
//! once, and dropped. Query shaping lives in a [`QueryOptions`] tree whose
//! `$expand` children own their own options.

use std::fmt;

use serde_json::Value;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl RequestMethod {
    /// Wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Patch => "PATCH",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        }
    }

    /// Convert to reqwest::Method.
    pub fn to_reqwest(&self) -> reqwest::Method {
        match self {
            RequestMethod::Get => reqwest::Method::GET,
            RequestMethod::Post => reqwest::Method::POST,
            RequestMethod::Patch => reqwest::Method::PATCH,
            RequestMethod::Put => reqwest::Method::PUT,
            RequestMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `$expand` contents of a query node.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Expand {
    /// No expansion.
    #[default]
    None,
    /// Pre-built expand clause, appended verbatim.
    Raw(String),
    /// Structured expansions, each with its own nested options.
    Items(Vec<ExpandItem>),
}

/// One navigation property to expand, with nested query options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandItem {
    /// Navigation property name.
    pub property: String,
    /// Options composed inside the parentheses, `;`-separated.
    pub options: QueryOptions,
}

impl ExpandItem {
    /// Expand a navigation property with no nested options.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            options: QueryOptions::default(),
        }
    }

    /// Select fields of the expanded entity.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Filter expanded collection members.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.options.filter = Some(filter.into());
        self
    }

    /// Order expanded collection members.
    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.order_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Limit expanded collection members.
    pub fn top(mut self, top: u32) -> Self {
        self.options.top = Some(top);
        self
    }

    /// Add a nested expansion.
    pub fn expand(mut self, item: ExpandItem) -> Self {
        self.options.push_expand(item);
        self
    }
}

/// Query shaping options for one node of the request tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub navigation_property: Option<String>,
    pub navigation_property_key: Option<String>,
    /// Attribute metadata cast, only used under the `Attributes` navigation property.
    pub metadata_attribute_type: Option<String>,
    /// Field paths. A leading `/path` entry or a lone `…/$ref` entry is a
    /// path suffix on `retrieve`, not a selected field.
    pub select: Vec<String>,
    pub filter: Option<String>,
    pub order_by: Vec<String>,
    /// Ignored unless greater than zero.
    pub top: Option<u32>,
    pub count: bool,
    pub apply: Option<String>,
    pub saved_query: Option<String>,
    pub user_query: Option<String>,
    pub expand: Expand,
}

impl QueryOptions {
    /// Append a structured expansion, replacing a raw expand clause.
    pub fn push_expand(&mut self, item: ExpandItem) {
        match &mut self.expand {
            Expand::Items(items) => items.push(item),
            other => *other = Expand::Items(vec![item]),
        }
    }
}

/// Canonical form of the `Prefer` header.
///
/// Raw prefer strings are parsed into this shape at the boundary; nothing
/// downstream sees the raw form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferOptions {
    pub return_representation: Option<bool>,
    pub include_annotations: Option<String>,
    pub max_page_size: Option<u32>,
    pub track_changes: bool,
}

impl PreferOptions {
    /// Parse a comma-joined prefer string such as
    /// `return=representation,odata.maxpagesize=10`.
    pub fn parse(raw: &str) -> Self {
        let mut prefer = Self::default();
        prefer.merge_tokens(raw.split(','));
        prefer
    }

    /// Merge prefer tokens into this value. Recognized tokens override
    /// whatever was set before; unknown tokens are ignored.
    pub fn merge_tokens<'a>(&mut self, tokens: impl IntoIterator<Item = &'a str>) {
        for token in tokens {
            let token = token.trim();
            if token == "return=representation" {
                self.return_representation = Some(true);
            } else if let Some(value) = token.strip_prefix("odata.include-annotations=") {
                self.include_annotations = Some(value.replace('"', ""));
            } else if let Some(value) = token.strip_prefix("odata.maxpagesize=") {
                if let Ok(size) = value.replace('"', "").trim().parse() {
                    self.max_page_size = Some(size);
                }
            } else if token.contains("odata.track-changes") {
                self.track_changes = true;
            }
        }
    }
}

/// A request descriptor.
///
/// Exactly one addressing mode is active: `url`, or `collection` with an
/// optional `key`/`id` and navigation property. Composition rejects a
/// descriptor that sets `url` together with `collection`, `key` or `id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    /// Entity set name, e.g. `accounts`.
    pub collection: Option<String>,
    /// Alternate key expression or GUID.
    pub key: Option<String>,
    /// Record GUID; normalized into the key when no key is given.
    pub id: Option<String>,
    pub query: QueryOptions,
    pub fetch_xml: Option<String>,

    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    /// Systemuser GUID to act on behalf of.
    pub impersonate: Option<String>,
    /// Bearer token for this request only.
    pub token: Option<String>,
    pub duplicate_detection: bool,
    pub no_cache: bool,
    pub merge_labels: bool,
    /// Batch Content-ID, or a `$n` back-reference to an earlier change-set item.
    pub content_id: Option<String>,
    pub prefer: PreferOptions,

    /// Payload for write operations.
    pub data: Option<Value>,
    /// Full URL overriding structured addressing.
    pub url: Option<String>,
    /// Defaults to `true` when unset.
    pub is_async: Option<bool>,

    /// Set by operation builders for requests that target no collection
    /// (functions and actions).
    pub unbound: bool,
    /// Sub-resource appended after the addressed record, set by operation builders.
    pub additional_url: Option<String>,
}

impl Request {
    /// Address an entity set.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: Some(collection.into()),
            ..Default::default()
        }
    }

    /// Address a full URL instead of a collection.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Address a request bound to no collection, e.g. `WhoAmI`.
    pub fn unbound(additional_url: impl Into<String>) -> Self {
        Self {
            unbound: true,
            additional_url: Some(additional_url.into()),
            ..Default::default()
        }
    }

    /// Address a record by GUID.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Address a record by alternate key, e.g. `accountnumber='A1'`.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Address a related collection or single-valued navigation property.
    pub fn navigation_property(mut self, property: impl Into<String>) -> Self {
        self.query.navigation_property = Some(property.into());
        self
    }

    /// Address one member of the navigation property.
    pub fn navigation_property_key(mut self, key: impl Into<String>) -> Self {
        self.query.navigation_property_key = Some(key.into());
        self
    }

    /// Cast `Attributes` metadata to a derived type.
    pub fn metadata_attribute_type(mut self, cast: impl Into<String>) -> Self {
        self.query.metadata_attribute_type = Some(cast.into());
        self
    }

    /// Select fields.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.select = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Filter expression.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.query.filter = Some(filter.into());
        self
    }

    /// Order by clauses, e.g. `["name asc", "createdon desc"]`.
    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.order_by = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Limit the number of records.
    pub fn top(mut self, top: u32) -> Self {
        self.query.top = Some(top);
        self
    }

    /// Include `@odata.count` in collection responses.
    pub fn count(mut self, count: bool) -> Self {
        self.query.count = count;
        self
    }

    /// Aggregation transformation.
    pub fn apply(mut self, apply: impl Into<String>) -> Self {
        self.query.apply = Some(apply.into());
        self
    }

    /// Execute a system view.
    pub fn saved_query(mut self, id: impl Into<String>) -> Self {
        self.query.saved_query = Some(id.into());
        self
    }

    /// Execute a personal view.
    pub fn user_query(mut self, id: impl Into<String>) -> Self {
        self.query.user_query = Some(id.into());
        self
    }

    /// Add a structured expansion.
    pub fn expand(mut self, item: ExpandItem) -> Self {
        self.query.push_expand(item);
        self
    }

    /// Use a pre-built expand clause.
    pub fn expand_raw(mut self, expand: impl Into<String>) -> Self {
        self.query.expand = Expand::Raw(expand.into());
        self
    }

    /// Run a FetchXML query against the collection.
    pub fn fetch_xml(mut self, fetch_xml: impl Into<String>) -> Self {
        self.fetch_xml = Some(fetch_xml.into());
        self
    }

    /// Only apply the write if the record's ETag matches (`*` for any).
    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    /// Only apply if the ETag does not match (`*` prevents overwrites).
    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }

    /// Act on behalf of another system user.
    pub fn impersonate(mut self, user_id: impl Into<String>) -> Self {
        self.impersonate = Some(user_id.into());
        self
    }

    /// Bearer token for this request.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Ask the server to run duplicate detection rules.
    pub fn duplicate_detection(mut self, enabled: bool) -> Self {
        self.duplicate_detection = enabled;
        self
    }

    /// Bypass server-side caches.
    pub fn no_cache(mut self, enabled: bool) -> Self {
        self.no_cache = enabled;
        self
    }

    /// Merge localized labels on metadata updates.
    pub fn merge_labels(mut self, enabled: bool) -> Self {
        self.merge_labels = enabled;
        self
    }

    /// Content-ID for a batch change-set item, or a `$n` reference to one.
    pub fn content_id(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Return the created or updated record.
    pub fn return_representation(mut self, enabled: bool) -> Self {
        self.prefer.return_representation = Some(enabled);
        self
    }

    /// Request annotations, e.g. `"*"`.
    pub fn include_annotations(mut self, annotations: impl Into<String>) -> Self {
        self.prefer.include_annotations = Some(annotations.into());
        self
    }

    /// Page size for collection queries.
    pub fn max_page_size(mut self, size: u32) -> Self {
        self.prefer.max_page_size = Some(size);
        self
    }

    /// Request a delta link.
    pub fn track_changes(mut self, enabled: bool) -> Self {
        self.prefer.track_changes = enabled;
        self
    }

    /// Merge a raw prefer string into the structured prefer options.
    pub fn prefer(mut self, raw: &str) -> Self {
        self.prefer.merge_tokens(raw.split(','));
        self
    }

    /// Request payload.
    pub fn data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Run synchronously on transports that support it.
    pub fn is_async(mut self, is_async: bool) -> Self {
        self.is_async = Some(is_async);
        self
    }

    /// Append a sub-resource path after the addressed record.
    pub fn additional_url(mut self, path: impl Into<String>) -> Self {
        self.additional_url = Some(path.into());
        self
    }
}
