//! Cursor over continuation-style API results.

use serde_json::Value;

use crate::error::{Result, WikiError};
use crate::params::{Directives, ParamValue, Params};
use crate::site::Site;

/// Parameters the driver owns. Callers must not set them.
const RESERVED: &[&str] = &["rawcontinue", "formatversion"];

/// Drives the `continue` protocol for one logical request.
///
/// Each [`next`](Self::next) makes at most one more call per response and
/// yields the action-named payload. [`inject`](Self::inject) overrides
/// parameters on the following request only.
///
/// ```no_run
/// # async fn run(site: &mut wikiapi_client::Site) -> wikiapi_client::Result<()> {
/// use wikiapi_client::params;
///
/// let mut pages = site.query(params! { "list" => "allpages", "aplimit" => "max" })?;
/// while let Some(result) = pages.next().await {
///     let result = result?;
///     println!("{} pages", result["allpages"].as_array().map_or(0, Vec::len));
/// }
/// # Ok(())
/// # }
/// ```
pub struct Continuation<'a> {
    site: &'a mut Site,
    action: String,
    base: Params,
    directives: Directives,
    /// `None` once the stream is exhausted or failed.
    pending: Option<Params>,
    adjustments: Params,
}

impl<'a> Continuation<'a> {
    pub(crate) fn new(
        site: &'a mut Site,
        action: &str,
        params: Params,
        directives: Directives,
    ) -> Result<Self> {
        for name in RESERVED {
            if params.contains(name) {
                return Err(WikiError::invalid_param(
                    *name,
                    "not supported when iterating, use Site::call instead",
                ));
            }
        }

        let mut base = params;
        if !base.contains("continue") {
            base.set("continue", "");
        }
        base.set("formatversion", 2);

        Ok(Self {
            site,
            action: action.to_string(),
            pending: Some(base.clone()),
            base,
            directives,
            adjustments: Params::new(),
        })
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    /// Whether the server has signalled the end of the results.
    pub fn is_finished(&self) -> bool {
        self.pending.is_none()
    }

    /// Override parameters for the next request. Later injections win.
    pub fn inject(&mut self, adjustments: Params) {
        self.adjustments.extend(adjustments);
    }

    /// Fetch the next payload. An error ends the stream.
    pub async fn next(&mut self) -> Option<Result<Value>> {
        loop {
            let mut request = self.pending.take()?;
            request.extend(std::mem::take(&mut self.adjustments));

            let mut result = match self
                .site
                .call_with(&self.action, request, &self.directives)
                .await
            {
                Ok(result) => result,
                Err(e) => return Some(Err(e)),
            };

            match result.get("continue") {
                None => {}
                Some(Value::Object(tokens)) => {
                    let mut next = self.base.clone();
                    for (name, value) in tokens {
                        next.set(name.as_str(), ParamValue::from(value.clone()));
                    }
                    self.pending = Some(next);
                }
                Some(_) => {
                    return Some(Err(WikiError::protocol(
                        "Continuation field is not an object",
                        result,
                    )))
                }
            }

            if let Some(payload) = result.get_mut(&self.action).map(Value::take) {
                return Some(Ok(payload));
            }
            tracing::trace!(action = %self.action, "response carried no payload");
        }
    }
}
