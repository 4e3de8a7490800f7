use eden_query_wire::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::QueryKey;
use crate::domain::{EdenError, RequestDescriptor};

use super::input_value;

/// A statically described server procedure.
///
/// ```ignore
/// struct Greet;
///
/// impl Procedure for Greet {
///     type Input = GreetInput;
///     type Output = String;
///     const PATH: &'static [&'static str] = &["greet"];
///     const METHOD: Method = Method::Post;
/// }
/// ```
pub trait Procedure {
    type Input: Serialize;
    type Output: DeserializeOwned + Send + 'static;

    const PATH: &'static [&'static str];
    const METHOD: Method;

    fn descriptor(input: &Self::Input) -> Result<RequestDescriptor, EdenError> {
        let input = input_value(serde_json::to_value(input)?);
        Ok(RequestDescriptor::new(
            Self::PATH.iter().copied(),
            Self::METHOD,
            input,
        ))
    }

    fn query_key(input: &Self::Input) -> Result<QueryKey, EdenError> {
        let input = input_value(serde_json::to_value(input)?);
        Ok(QueryKey::new(Self::PATH, input.as_ref()))
    }
}

