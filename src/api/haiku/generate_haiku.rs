#![forbid(unsafe_code)]

use std::sync::Arc;

use log::{error, info};
use poem::{FromRequest, Request, RequestBody};
use poem_openapi::{ OpenApi, payload::Json, Object, ApiResponse, ApiExtractor, ApiExtractorType, ExtractParamOptions };
use poem_openapi::registry::{MetaMediaType, MetaRequest, Registry};
use poem_openapi::types::{ParseFromJSON, Type};

use crate::api::haiku::haiku_service::HaikuService;
use crate::utils::errors::HttpError;
use crate::utils::haiku_types::GeneratedHaiku;
use crate::utils::haiku_utils::{self, RequestDebug};

// Returned when the theme is absent or blank.
pub const MISSING_THEME_MSG: &str = "请提供俳句主题";

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct GenerateHaikuApi {
    service: Arc<HaikuService>,
}

impl GenerateHaikuApi {
    pub fn new(service: Arc<HaikuService>) -> Self {
        Self {service}
    }
}

#[derive(Object)]
struct ReqGenerateHaiku
{
    theme: Option<String>,
}

// ---------------------------------------------------------------------------
// HaikuRequestBody:
// ---------------------------------------------------------------------------
/** The unparsed request body.  The OpenAPI document still advertises the
 * ReqGenerateHaiku JSON schema, but any content type is accepted and parsing
 * happens in the handler so that malformed input gets the error poem rather
 * than a framework rejection.
 */
struct HaikuRequestBody(Vec<u8>);

impl HaikuRequestBody {
    fn parse(&self) -> Result<ReqGenerateHaiku, String> {
        let text = std::str::from_utf8(&self.0).map_err(|e| e.to_string())?;
        ReqGenerateHaiku::parse_from_json_string(text).map_err(|e| e.into_message())
    }
}

impl<'a> ApiExtractor<'a> for HaikuRequestBody {
    const TYPES: &'static [ApiExtractorType] = &[ApiExtractorType::RequestObject];

    type ParamType = ();
    type ParamRawType = ();

    fn register(registry: &mut Registry) {
        <ReqGenerateHaiku as Type>::register(registry);
    }

    fn request_meta() -> Option<MetaRequest> {
        Some(MetaRequest {
            description: None,
            content: vec![MetaMediaType {
                content_type: "application/json",
                schema: <ReqGenerateHaiku as Type>::schema_ref(),
            }],
            required: true,
        })
    }

    async fn from_request(
        request: &'a Request,
        body: &mut RequestBody,
        _param_opts: ExtractParamOptions<Self::ParamType>,
    ) -> poem::Result<Self> {
        Ok(Self(<Vec<u8> as FromRequest>::from_request(request, body).await?))
    }
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqGenerateHaiku {
    type Req = ReqGenerateHaiku;
    fn get_request_info(&self) -> String {
        let mut s = String::with_capacity(255);
        s.push_str("  Request body:");
        s.push_str("\n    theme: ");
        s.push_str(self.theme.as_deref().unwrap_or("None"));
        s.push('\n');
        s
    }
}

// ------------------- HTTP Status Codes -------------------
#[derive(Debug, ApiResponse)]
enum HaikuResponse {
    #[oai(status = 200)]
    Http200(Json<GeneratedHaiku>),
    #[oai(status = 400)]
    Http400(Json<HttpError>),
}

fn make_http_200(resp: GeneratedHaiku) -> HaikuResponse {
    HaikuResponse::Http200(Json(resp))
}
fn make_http_400(msg: String) -> HaikuResponse {
    HaikuResponse::Http400(Json(HttpError::new(msg)))
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl GenerateHaikuApi {
    #[oai(path = "/generate-haiku", method = "post")]
    async fn generate_haiku_api(&self, http_req: &Request, body: HaikuRequestBody) -> HaikuResponse {
        // An unreadable body is answered like any other internal failure.
        let req = match body.parse() {
            Ok(r) => r,
            Err(e) => {
                error!("Unable to parse haiku request body ({}): {}",
                       haiku_utils::preview(&String::from_utf8_lossy(&body.0), 80), e);
                return make_http_200(GeneratedHaiku::error_fallback());
            }
        };

        // Conditional logging depending on log level.
        haiku_utils::debug_request(http_req, &req);

        // -------------------- Validate Input -----------------------
        // Surrounding whitespace is stripped on purpose, so "  茶 " is 茶.
        let theme = match req.theme.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => {
                info!("Rejecting haiku request without a theme.");
                return make_http_400(MISSING_THEME_MSG.to_string());
            }
        };

        // -------------------- Process Request ----------------------
        // Generation never fails; the worst case is the error poem.
        make_http_200(self.service.generate(theme).await)
    }
}
