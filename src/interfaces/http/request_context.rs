use crate::domain::language::UiLanguage;
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use serde::Deserialize;
use std::future::{ready, Ready};

pub const LANG_COOKIE: &str = "lang";

#[derive(Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

/// Per-request UI language: `?lang=` first, then the `lang` cookie, else Arabic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub lang: UiLanguage,
}

impl RequestContext {
    fn from_http(req: &HttpRequest) -> Self {
        let from_query = web::Query::<LangQuery>::from_query(req.query_string())
            .ok()
            .and_then(|query| query.into_inner().lang)
            .and_then(|code| UiLanguage::from_code(&code));
        let from_cookie = || {
            req.cookie(LANG_COOKIE)
                .and_then(|cookie| UiLanguage::from_code(cookie.value()))
        };
        Self {
            lang: from_query.or_else(from_cookie).unwrap_or_default(),
        }
    }
}

impl FromRequest for RequestContext {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(Self::from_http(req)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    #[test]
    fn test_defaults_to_arabic() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(RequestContext::from_http(&req).lang, UiLanguage::Arabic);
    }

    #[test]
    fn test_query_beats_cookie() {
        let req = TestRequest::with_uri("/?lang=ar")
            .cookie(Cookie::new(LANG_COOKIE, "en"))
            .to_http_request();
        assert_eq!(RequestContext::from_http(&req).lang, UiLanguage::Arabic);

        let req = TestRequest::default()
            .cookie(Cookie::new(LANG_COOKIE, "en"))
            .to_http_request();
        assert_eq!(RequestContext::from_http(&req).lang, UiLanguage::English);
    }

    #[test]
    fn test_unknown_codes_are_ignored() {
        let req = TestRequest::with_uri("/?lang=fr")
            .cookie(Cookie::new(LANG_COOKIE, "xx"))
            .to_http_request();
        assert_eq!(RequestContext::from_http(&req).lang, UiLanguage::Arabic);
    }
}
