//! Decoded views over the serialized query results.

use chapi_abi::{wire, HandlerSummary, SearchField, SearchMode, SuiteId};

use super::RegistryStore;
use crate::error::{BridgeError, Result};
use crate::result::to_units;

fn summaries(payload: Option<Vec<u16>>) -> Result<Vec<HandlerSummary>> {
    match payload {
        None => Ok(Vec::new()),
        Some(p) => Ok(HandlerSummary::decode_list(&p)?),
    }
}

fn summary(payload: Option<Vec<u16>>) -> Result<Option<HandlerSummary>> {
    match payload {
        None => Ok(None),
        Some(p) => Ok(HandlerSummary::decode(&p)?),
    }
}

fn strings(payload: Option<Vec<u16>>) -> Result<Vec<String>> {
    match payload {
        None => Ok(Vec::new()),
        Some(p) => Ok(wire::decode_strings(&p)?),
    }
}

impl RegistryStore {
    pub fn find_handlers(
        &self,
        caller_id: Option<&str>,
        field: SearchField,
        value: &str,
    ) -> Result<Vec<HandlerSummary>> {
        summaries(self.find_handler_as(caller_id, field, value, to_units)?)
    }

    /// Handlers whose ID collides with `id`, regardless of caller access.
    pub fn find_conflicted(&self, id: &str) -> Result<Vec<HandlerSummary>> {
        let found = self.find_handlers(None, SearchField::Id, id)?;
        tracing::debug!(id, conflicts = found.len(), "conflicting handlers");
        Ok(found)
    }

    pub fn handlers_for_suite(&self, suite: SuiteId) -> Result<Vec<HandlerSummary>> {
        summaries(self.find_for_suite_as(suite, to_units)?)
    }

    /// Values of `field` across handlers visible to the caller.
    pub fn values(&self, caller_id: Option<&str>, field: SearchField) -> Result<Vec<String>> {
        strings(self.get_all_as(caller_id, field, to_units)?)
    }

    /// Contents of one array field of one handler.
    pub fn array_field(&self, id: &str, field: SearchField) -> Result<Vec<String>> {
        strings(self.get_handler_field_as(id, field, to_units)?)
    }

    /// An empty `id` never matches and skips the engine.
    pub fn handler(
        &self,
        caller_id: Option<&str>,
        id: &str,
        mode: SearchMode,
    ) -> Result<Option<HandlerSummary>> {
        if id.is_empty() {
            return Ok(None);
        }
        summary(self.get_handler_as(caller_id, id, mode, to_units)?)
    }

    pub fn handler_by_url_summary(
        &self,
        caller_id: Option<&str>,
        url: &str,
        action: Option<&str>,
    ) -> Result<Option<HandlerSummary>> {
        summary(self.handler_by_url_as(caller_id, url, action, to_units)?)
    }

    /// The handler `suite` registered under `class_name`.
    pub fn handler_for_class(
        &self,
        suite: SuiteId,
        class_name: &str,
    ) -> Result<Option<HandlerSummary>> {
        if class_name.is_empty() {
            return Err(BridgeError::InvalidArgument(
                "class name must not be empty".into(),
            ));
        }
        Ok(self
            .handlers_for_suite(suite)?
            .into_iter()
            .find(|h| h.class_name == class_name))
    }
}
