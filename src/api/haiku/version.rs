#![forbid(unsafe_code)]

use poem_openapi::{  OpenApi, payload::Json, Object };

// From cargo.toml.
const HAIKU_VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
pub struct VersionApi;

#[derive(Object)]
struct RespVersion
{
    result_code: String,
    result_msg: String,
    haiku_version: String,
    git_branch: String,
    git_commit: String,
    git_dirty: String,
    source_ts: String,
    rustc_version: String,
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl VersionApi {
    #[oai(path = "/version", method = "get")]
    async fn get_version(&self) -> Json<RespVersion> {
        Json(RespVersion::process())
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespVersion {
    #[allow(clippy::too_many_arguments)]
    fn new(result_code: &str, result_msg: &str, haiku: &str, branch: &str, commit: &str, dirty: &str, ts: &str, rustc: &str)
    -> Self {
        Self {result_code: result_code.to_string(),
              result_msg: result_msg.to_string(),
              haiku_version: haiku.to_string(),
              git_branch: branch.to_string(),
              git_commit: commit.to_string(),
              git_dirty:  dirty.to_string(),
              source_ts: ts.to_string(),
              rustc_version: rustc.to_string(),
        }
    }

    fn process() -> RespVersion {
        Self::new("0",
                  "success",
                  HAIKU_VERSION.unwrap_or("unknown"),
                  env!("GIT_BRANCH"),
                  env!("GIT_COMMIT_SHORT"),
                  env!("GIT_DIRTY"),
                  env!("SOURCE_TIMESTAMP"),
                  env!("RUSTC_VERSION"))
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::test::TestClient;
    use poem::Route;
    use poem_openapi::OpenApiService;

    #[tokio::test]
    async fn version_reports_package() {
        let api = OpenApiService::new(VersionApi, "Haiku Server", "test");
        let cli = TestClient::new(Route::new().nest("/api", api));
        let resp = cli.get("/api/version").send().await;
        resp.assert_status_is_ok();
        let body = resp.json().await;
        let obj = body.value().object();
        obj.get("result_code").assert_string("0");
        obj.get("haiku_version").assert_string(env!("CARGO_PKG_VERSION"));
    }
}
