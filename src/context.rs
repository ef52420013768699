//! Request context
//!
//! All dependencies are constructed once in `main` and bundled per inbound
//! request together with a fresh `RequestCache`. Operations receive this
//! bundle explicitly; nothing reaches for process-wide state.

use std::sync::Arc;

use crate::cache::RequestCache;
use crate::hooks::PostProcessHook;
use crate::identity::IdentityClient;
use crate::mirror::MirrorStore;
use crate::sheets::SheetsApi;

pub struct RequestContext {
    pub sheets: Arc<dyn SheetsApi>,
    pub mirror: Arc<MirrorStore>,
    pub identity: Arc<IdentityClient>,
    pub hook: Option<PostProcessHook>,
    pub cache: Arc<RequestCache>,
}

impl RequestContext {
    pub fn new(
        sheets: Arc<dyn SheetsApi>,
        mirror: Arc<MirrorStore>,
        identity: Arc<IdentityClient>,
        hook: Option<PostProcessHook>,
        cache: Arc<RequestCache>,
    ) -> Self {
        Self {
            sheets,
            mirror,
            identity,
            hook,
            cache,
        }
    }
}
