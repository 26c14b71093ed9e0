use std::{
    fmt::{self, Display},
    ops::Deref,
    str::FromStr,
};

use mongodb::bson::{doc, oid::ObjectId, Document};
use rocket::{
    data::ToByteUnit,
    form::{self, prelude::ErrorKind, DataField, FromFormField, ValueField},
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
        Status,
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};

/// A document identifier, freshly generated for insertion or read back from the database.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(ObjectId);

impl Id {
    /// Generate a new unique ID.
    pub fn new() -> Self {
        Self(ObjectId::new())
    }

    /// A filter document matching exactly this ID.
    pub fn as_doc(&self) -> Document {
        doc! { "_id": self.0 }
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Id {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = mongodb::bson::oid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<ObjectId>()?))
    }
}

impl From<ObjectId> for Id {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = mongodb::bson::oid::Error;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse::<Id>()
    }
}

#[rocket::async_trait]
impl<'r> FromFormField<'r> for Id {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        field.value.parse::<ObjectId>().map(Id).map_err(|err| {
            let error = ErrorKind::Custom(Status::UnprocessableEntity, Box::new(err));
            error.into()
        })
    }

    async fn from_data(field: DataField<'r, '_>) -> form::Result<'r, Self> {
        field
            .data
            .open(12.bytes())
            .into_string()
            .await?
            .into_inner()
            .parse::<ObjectId>()
            .map(Id)
            .map_err(|err| {
                let error = ErrorKind::Custom(Status::UnprocessableEntity, Box::new(err));
                error.into()
            })
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(self.to_string())
    }
}

impl_from_uri_param_identity!([Path] Id);

/// Serialize a map via the `Display`/`FromStr` representation of its keys.
///
/// Maps with non-string keys are not directly BSON/JSON compatible, so this must be used
/// on any such field of a (de)serializable type.
pub mod serde_string_map {
    use std::{collections::HashMap, fmt::Display, hash::Hash, str::FromStr};

    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<K, V, S>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Display,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_map(map.iter().map(|(k, v)| (k.to_string(), v)))
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<HashMap<K, V>, D::Error>
    where
        K: FromStr + Eq + Hash,
        K::Err: Display,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let string_map = HashMap::<String, V>::deserialize(deserializer)?;
        string_map
            .into_iter()
            .map(|(k, v)| Ok((k.parse().map_err(de::Error::custom)?, v)))
            .collect()
    }
}

/// (De)serialize an `Option<chrono::DateTime<Utc>>` as a nullable BSON datetime.
///
/// The stock `chrono_datetime_as_bson_datetime` helper does not handle `Option`.
pub mod serde_option_chrono_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value
            .map(bson::DateTime::from_chrono)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let datetime = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(datetime.map(|dt| dt.to_chrono()))
    }
}
