//! Per-request state handed to user handlers.

use weft_component::{RequestContext, ResponsePage};
use weft_model::{CookieJar, CookieMutation, Parameters, WebRequest};

/// What a listener asked the cycle to respond with.
#[derive(Debug, Default)]
pub(crate) enum Requested {
    /// Nothing requested: respond with the page the listener ran on.
    #[default]
    Current,
    Page(ResponsePage),
    Redirect(String),
}

/// One request's view of parameters, cookies and the response choice.
///
/// The cycle also holds the session's remembered destination for the
/// duration of the request; the coordinator writes whatever is left of it
/// back to the session when the request ends.
#[derive(Debug)]
pub struct RequestCycle {
    parameters: Parameters,
    cookies: CookieJar,
    requested: Requested,
    original_destination: Option<String>,
}

impl RequestCycle {
    pub fn new(request: &WebRequest, original_destination: Option<String>) -> Self {
        Self {
            parameters: request.parameters(),
            cookies: CookieJar::new(request.cookies.clone()),
            requested: Requested::Current,
            original_destination,
        }
    }

    pub fn cookie_jar(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn take_cookie_mutations(&mut self) -> Vec<CookieMutation> {
        self.cookies.take_mutations()
    }

    /// Remember `url` so a later `continue_to_original_destination` can
    /// return to it.
    pub fn remember_original_destination(&mut self, url: String) {
        self.original_destination = Some(url);
    }

    pub fn take_original_destination(&mut self) -> Option<String> {
        self.original_destination.take()
    }

    pub(crate) fn take_requested(&mut self) -> Requested {
        std::mem::take(&mut self.requested)
    }
}

impl RequestContext for RequestCycle {
    fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn set_response_page(&mut self, page: ResponsePage) {
        self.requested = Requested::Page(page);
    }

    fn redirect_to(&mut self, url: String) {
        self.requested = Requested::Redirect(url);
    }

    fn continue_to_original_destination(&mut self) -> bool {
        match self.original_destination.take() {
            Some(url) => {
                self.requested = Requested::Redirect(url);
                true
            }
            None => false,
        }
    }

    fn cookies(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn original_destination_is_used_once() {
        let request = WebRequest::get("/");
        let mut cycle = RequestCycle::new(&request, Some("/?component=0".to_string()));
        assert!(cycle.continue_to_original_destination());
        assert!(!cycle.continue_to_original_destination());
        assert!(matches!(
            cycle.take_requested(),
            Requested::Redirect(url) if url == "/?component=0"
        ));
        assert!(matches!(cycle.take_requested(), Requested::Current));
        assert_eq!(cycle.take_original_destination(), None);
    }
}
