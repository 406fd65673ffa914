//! Client for MediaWiki-style `api.php` endpoints.
//!
//! [`Site`] normalizes call parameters, retries connection failures and
//! maxlag refusals under separate budgets, and resolves server errors and
//! warnings. On top of it, [`Continuation`] follows the `continue` protocol and
//! [`PageStream`] reassembles page objects split across responses.
//!
//! ```no_run
//! use wikiapi_client::{params, Site, WikiError};
//!
//! # async fn run() -> wikiapi_client::Result<()> {
//! let mut site = Site::new("https://en.wikipedia.org/w/api.php")?;
//! site.login("ExampleBot@tools", "bot-password", true).await?;
//!
//! let mut pages = site.query_pages(params! {
//!     "generator" => "allpages",
//!     "gaplimit" => 50,
//!     "prop" => "revisions",
//! })?;
//! while let Some(page) = pages.next().await {
//!     match page {
//!         Ok(page) => println!("{}", page["title"]),
//!         Err(WikiError::PagesModified { ids }) => eprintln!("changed: {ids:?}"),
//!         Err(e) => return Err(e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod continuation;
pub mod error;
pub mod pages;
pub mod params;
pub mod response;
pub mod retry;
pub mod session;
pub mod site;

pub use continuation::Continuation;
pub use error::{Result, WikiError};
pub use pages::{merge_page, PageStream};
pub use params::{
    prepare_call, Directive, Directives, Extras, ParamValue, Params, PreparedCall, RequestSettings,
};
pub use retry::{RetryBudget, RetryPolicy, RetrySettings};
pub use session::DEFAULT_TOKEN_TYPE;
pub use site::{default_user_agent, Site, SiteBuilder, DEFAULT_TIMEOUT};
