//! The site handle and its retry engine.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use wikiapi_common_config::WikiApiConfig;
use wikiapi_common_http::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use wikiapi_common_http::{
    headers, parse_json, HttpClient, HttpConfig, HttpError, HttpRequest, HttpResponse, Transport,
};

use crate::continuation::Continuation;
use crate::error::{Result, WikiError};
use crate::pages::PageStream;
use crate::params::{prepare_call, Directives, Params, PreparedCall, RequestSettings};
use crate::response::{check_status, classify, resolve, Classification};
use crate::retry::{lag_backoff, RetryBudget, RetryPolicy, RetrySettings};
use crate::session::Session;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// `User-Agent` built from the running executable, e.g. `bin-mybot wikiapi/0.1.0`.
pub fn default_user_agent() -> String {
    let suffix = format!("wikiapi/{}", env!("CARGO_PKG_VERSION"));
    let Ok(exe) = std::env::current_exe() else {
        return suffix;
    };

    let name = exe.file_name().map(|n| n.to_string_lossy().into_owned());
    let parent = exe
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());

    match (parent, name) {
        (Some(parent), Some(name)) => format!("{parent}-{name} {suffix}"),
        (None, Some(name)) => format!("{name} {suffix}"),
        _ => suffix,
    }
}

/// A connection to one wiki's `api.php`.
///
/// All calls go through the retry engine: connection failures and maxlag
/// refusals are retried under separate budgets, everything else surfaces as a
/// [`WikiError`]. Calls take `&mut self`; share a site between tasks behind a
/// mutex.
pub struct Site {
    url: String,
    transport: Arc<dyn Transport>,
    headers: HeaderMap,
    settings: RequestSettings,
    retry: RetrySettings,
    timeout: Option<Duration>,
    pub(crate) session: Session,
}

impl Site {
    /// Create a site with default settings and a reqwest transport.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        SiteBuilder::new(url).build()
    }

    pub fn builder(url: impl Into<String>) -> SiteBuilder {
        SiteBuilder::new(url)
    }

    /// Build a site from a loaded configuration.
    ///
    /// Configured credentials log in right away, or on the first call when
    /// `on_demand` is set.
    pub async fn from_config(config: &WikiApiConfig) -> Result<Self> {
        let site_config = &config.site;
        let mut builder = SiteBuilder::new(site_config.url.clone())
            .maxlag(site_config.maxlag)
            .auto_post_min_size(site_config.auto_post_min_size)
            .no_ssl(site_config.no_ssl)
            .retry(RetrySettings::from(&config.retry))
            .timeout(config.http.request_timeout_secs.map(Duration::from_secs))
            .http_config(HttpConfig {
                connect_timeout: Duration::from_secs(config.http.connect_timeout_secs),
                pool_max_idle_per_host: config.http.pool_max_idle_per_host,
                gzip: config.http.gzip,
                ..HttpConfig::default()
            });
        if let Some(user_agent) = &site_config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let mut site = builder.build()?;
        if let Some(login) = &site_config.login {
            site.login(&login.user, &login.password, login.on_demand)
                .await?;
        }
        Ok(site)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Headers sent with every request.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn request_settings(&self) -> &RequestSettings {
        &self.settings
    }

    pub fn retry_settings(&self) -> &RetrySettings {
        &self.retry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Call an API action.
    ///
    /// ```no_run
    /// # async fn run() -> wikiapi_client::Result<()> {
    /// use wikiapi_client::{params, Site};
    ///
    /// let mut site = Site::new("https://en.wikipedia.org/w/api.php")?;
    /// let info = site.call("query", params! { "meta" => "siteinfo" }).await?;
    /// println!("{}", info["query"]["general"]["sitename"]);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call(&mut self, action: &str, params: Params) -> Result<Value> {
        self.call_with(action, params, &Directives::default()).await
    }

    /// Call an API action with protocol directives.
    ///
    /// Deferred credentials are used first unless the action is `login` or
    /// the call carries `NO_LOGIN`.
    pub async fn call_with(
        &mut self,
        action: &str,
        params: Params,
        directives: &Directives,
    ) -> Result<Value> {
        if action != "login" && !directives.no_login {
            self.login_if_pending().await?;
        }
        self.send_call(action, &params, directives).await
    }

    /// Run one call through the retry engine without the login check.
    pub(crate) async fn send_call(
        &self,
        action: &str,
        params: &Params,
        directives: &Directives,
    ) -> Result<Value> {
        let prepared = prepare_call(action, params, directives, &self.settings)?;
        let request = self.build_request(&prepared);

        let mut connection = RetryBudget::new(self.retry.connection);
        let mut lag = RetryBudget::new(self.retry.lag);

        let body = loop {
            if !self.retry.pre_request_delay.is_zero() {
                tokio::time::sleep(self.retry.pre_request_delay).await;
            }

            let response = match self.transport.send(request.clone()).await {
                Ok(response) => response,
                Err(e) if e.is_connection() => {
                    self.on_connection_failure(&mut connection, e)?;
                    tokio::time::sleep(self.retry.connection_delay).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            check_status(&response)?;
            self.log_response(&request, &response);

            let body = parse_json(&response)?;
            let reported_lag = match classify(&body) {
                Classification::Final => break body,
                Classification::Maxlag { lag } => lag.cloned(),
            };

            let retry_after = lag_backoff(response.retry_after(), self.retry.default_lag_delay);
            let retrying = lag.try_consume();
            self.log_maxlag(retrying, retry_after, reported_lag.as_ref(), &response);

            if !retrying {
                break body;
            }
            tokio::time::sleep(retry_after).await;
        };

        resolve(body)
    }

    fn build_request(&self, prepared: &PreparedCall) -> HttpRequest {
        let mut request = HttpRequest::new(prepared.method, self.url.clone())
            .params(prepared.params.clone())
            .headers(&self.headers)
            .timeout(self.timeout)
            .force_ssl(prepared.force_ssl);

        if let Some(extras) = &prepared.extras {
            request = request.headers(&extras.headers);
            if let Some(timeout) = extras.timeout {
                request = request.timeout(Some(timeout));
            }
        }
        request
    }

    /// Spend a connection retry or give up with the transport error.
    fn on_connection_failure(&self, budget: &mut RetryBudget, error: HttpError) -> Result<()> {
        if !budget.try_consume() {
            tracing::warn!(
                code = "connection-retry",
                retries = budget.used(),
                api = %self.url,
                error = %error,
                "Connection failed, retries exhausted"
            );
            return Err(error.into());
        }

        tracing::info!(
            code = "connection-retry",
            retry = budget.used(),
            retry_after = self.retry.connection_delay.as_secs_f64(),
            api = %self.url,
            error = %error,
            "Connection failed, retrying in {:?}",
            self.retry.connection_delay
        );
        Ok(())
    }

    fn log_maxlag(
        &self,
        retrying: bool,
        retry_after: Duration,
        lag: Option<&Value>,
        response: &HttpResponse,
    ) {
        let enabled = if retrying {
            tracing::enabled!(Level::INFO)
        } else {
            tracing::enabled!(Level::WARN)
        };
        if !enabled {
            return;
        }

        let mut message = String::from("Server exceeded maxlag");
        if retrying {
            message.push_str(&format!(", retrying in {}s", retry_after.as_secs_f64()));
        }
        if let Some(lag) = lag {
            message.push_str(&format!(", lag={lag}"));
        }
        message.push_str(&format!(", API={}", self.url));

        let lag = lag.map(Value::to_string);
        let x_database_lag = response.header(headers::X_DATABASE_LAG);
        if retrying {
            tracing::info!(
                code = "maxlag-retry",
                retry_after = retry_after.as_secs_f64(),
                lag = ?lag,
                x_database_lag = ?x_database_lag,
                api = %self.url,
                "{message}"
            );
        } else {
            tracing::warn!(
                code = "maxlag-retry",
                retry_after = retry_after.as_secs_f64(),
                lag = ?lag,
                x_database_lag = ?x_database_lag,
                api = %self.url,
                "{message}"
            );
        }
    }

    fn log_response(&self, request: &HttpRequest, response: &HttpResponse) {
        if tracing::enabled!(Level::DEBUG) {
            let bytes = response.body.len();
            tracing::debug!(
                code = "server-response",
                method = %request.method,
                url = %request.url,
                status = response.status,
                bytes,
                "Request: {} {}\nResponse: {} bytes",
                request.method,
                request.url,
                bytes
            );
        }
    }

    /// Iterate a continuation-style action, yielding each response's payload.
    pub fn iterate(&mut self, action: &str, params: Params) -> Result<Continuation<'_>> {
        self.iterate_with(action, params, Directives::default())
    }

    pub fn iterate_with(
        &mut self,
        action: &str,
        params: Params,
        directives: Directives,
    ) -> Result<Continuation<'_>> {
        Continuation::new(self, action, params, directives)
    }

    /// Iterate `action=query`, yielding each response's `query` object.
    pub fn query(&mut self, params: Params) -> Result<Continuation<'_>> {
        self.iterate("query", params)
    }

    /// Iterate `action=query`, yielding complete page objects.
    pub fn query_pages(&mut self, params: Params) -> Result<PageStream<'_>> {
        self.query_pages_with(params, Directives::default())
    }

    pub fn query_pages_with(
        &mut self,
        params: Params,
        directives: Directives,
    ) -> Result<PageStream<'_>> {
        Ok(PageStream::new(self.iterate_with(
            "query", params, directives,
        )?))
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)?;
        if self.session.is_logged_in() {
            f.write_str(" (logged in)")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("url", &self.url)
            .field("settings", &self.settings)
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Site`].
pub struct SiteBuilder {
    url: String,
    transport: Option<Arc<dyn Transport>>,
    headers: Vec<(String, String)>,
    user_agent: Option<String>,
    settings: RequestSettings,
    retry: RetrySettings,
    timeout: Option<Duration>,
    http: HttpConfig,
}

impl SiteBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: None,
            headers: Vec::new(),
            user_agent: None,
            settings: RequestSettings::default(),
            retry: RetrySettings::default(),
            timeout: Some(DEFAULT_TIMEOUT),
            http: HttpConfig::default(),
        }
    }

    /// Use a custom transport instead of the reqwest client.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Identify the client. Defaults to [`default_user_agent`].
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Replication lag ceiling in seconds. `None` omits `maxlag`.
    pub fn maxlag(mut self, maxlag: Option<u32>) -> Self {
        self.settings.maxlag = maxlag;
        self
    }

    pub fn auto_post_min_size(mut self, size: usize) -> Self {
        self.settings.auto_post_min_size = size;
        self
    }

    pub fn no_ssl(mut self, no_ssl: bool) -> Self {
        self.settings.no_ssl = no_ssl;
        self
    }

    pub fn retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn connection_retries(mut self, policy: RetryPolicy) -> Self {
        self.retry.connection = policy;
        self
    }

    pub fn connection_delay(mut self, delay: Duration) -> Self {
        self.retry.connection_delay = delay;
        self
    }

    pub fn lag_retries(mut self, policy: RetryPolicy) -> Self {
        self.retry.lag = policy;
        self
    }

    pub fn pre_request_delay(mut self, delay: Duration) -> Self {
        self.retry.pre_request_delay = delay;
        self
    }

    /// Per-request timeout. `None` waits indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Settings for the default reqwest transport.
    pub fn http_config(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn build(self) -> Result<Site> {
        let url = self.url.trim().to_string();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(WikiError::Config(format!(
                "site URL must start with http:// or https://, got '{url}'"
            )));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|e| WikiError::Config(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| WikiError::Config(format!("invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        if let Some(user_agent) = self.user_agent {
            let value = HeaderValue::try_from(user_agent.as_str())
                .map_err(|e| WikiError::Config(format!("invalid user agent: {e}")))?;
            headers.insert(USER_AGENT, value);
        } else if !headers.contains_key(USER_AGENT) {
            let value = HeaderValue::try_from(default_user_agent())
                .unwrap_or_else(|_| HeaderValue::from_static("wikiapi"));
            headers.insert(USER_AGENT, value);
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                HttpClient::with_config(self.http)
                    .map_err(|e| WikiError::Config(e.to_string()))?,
            ),
        };

        Ok(Site {
            url,
            transport,
            headers,
            settings: self.settings,
            retry: self.retry,
            timeout: self.timeout,
            session: Session::default(),
        })
    }
}
