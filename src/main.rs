#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Result;
use lazy_static::lazy_static;
use log::{error, info};
use poem::listener::{Listener, RustlsCertificate, RustlsConfig};
use poem::{listener::TcpListener, Route};
use poem_openapi::OpenApiService;

// Haiku Utilities
use crate::api::haiku::generate_haiku::GenerateHaikuApi;
use crate::api::haiku::haiku_service::HaikuService;
use crate::api::haiku::version::VersionApi;
use crate::llm::{ChatCompletionClient, TextGenerator};
use crate::utils::config::{init_log, init_runtime_context, RuntimeCtx, HAIKU_ARGS, HAIKU_DIRS, CERT_FILE, KEY_FILE};
use crate::utils::errors::Errors;

// Modules
mod api;
mod llm;
mod session;
mod utils;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const SERVER_NAME : &str = "HaikuServer"; // for poem logging
const API_PREFIX  : &str = "/api";

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Lazily initialize the parameters variable so that is has a 'static lifetime.
// We exit if we can't read our parameters.
lazy_static! {
    static ref RUNTIME_CTX: RuntimeCtx = init_runtime_context();
}

// ---------------------------------------------------------------------------
// main:
// ---------------------------------------------------------------------------
#[tokio::main]
async fn main() -> Result<()> {
    // Only create the data directories if requested.
    if HAIKU_ARGS.create_dirs_only {
        println!("Haiku data directories created under {}", HAIKU_DIRS.root_dir);
        return Ok(());
    }

    // --------------- Initialize ---------------------
    haiku_init();

    // Terminal sessions never start the server.
    if RUNTIME_CTX.haiku_args.session {
        return session::run_session(&RUNTIME_CTX.parms.config.session,
                                    RUNTIME_CTX.haiku_args.server_url.as_deref()).await;
    }

    println!("Starting haiku_server!");

    // The upstream credential is mandatory for the server.
    let client = match ChatCompletionClient::from_config(&RUNTIME_CTX.parms.config.ai) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    info!("AI client configured: {:?}", client);
    let generator: Arc<dyn TextGenerator> = Arc::new(client);
    let service = Arc::new(HaikuService::new(Some(generator), &RUNTIME_CTX.parms.config.ai));

    // --------------- Main Loop Set Up ---------------
    // Assign base URL.
    let haiku_url = format!("{}:{}{}",
        RUNTIME_CTX.parms.config.http_addr,
        RUNTIME_CTX.parms.config.http_port,
        API_PREFIX);

    let endpoints = (GenerateHaikuApi::new(service), VersionApi);
    let api_service =
        OpenApiService::new(endpoints, RUNTIME_CTX.parms.config.title.as_str(), env!("CARGO_PKG_VERSION"))
            .server(haiku_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();

    // Create the routes and run the server.
    let addr = format!("{}{}", "0.0.0.0:", RUNTIME_CTX.parms.config.http_port);
    let ui = api_service.swagger_ui();
    let app = Route::new()
        .nest(API_PREFIX, api_service)
        .nest("/", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml);

    // ------------------ Main Loop -------------------
    if RUNTIME_CTX.parms.config.enable_tls {
        let certs_dir = &RUNTIME_CTX.haiku_dirs.certs_dir;
        poem::Server::new(
            TcpListener::bind(addr).rustls(
                RustlsConfig::new().fallback(
                    RustlsCertificate::new()
                        .key(std::fs::read(certs_dir.clone() + KEY_FILE)?)
                        .cert(std::fs::read(certs_dir.clone() + CERT_FILE)?),
                ),
            ),
        )
        .name(SERVER_NAME)
        .run(app)
        .await?;
    } else {
        poem::Server::new(TcpListener::bind(addr))
            .name(SERVER_NAME)
            .run(app)
            .await?;
    }

    Ok(())
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// haiku_init:
// ---------------------------------------------------------------------------
/** Initialize logging and the runtime context. */
fn haiku_init() {
    // Configure our log.
    init_log();

    // Force the reading of input parameters and initialization of runtime context.
    info!("{}", Errors::InputParms(format!("{:#?}", *RUNTIME_CTX)));

    // Log build info.
    print_version_info();
}

// ---------------------------------------------------------------------------
// print_version_info:
// ---------------------------------------------------------------------------
fn print_version_info() {
    info!("\n*** Running HAIKU={}, BRANCH={}, COMMIT={}, DIRTY={}, SRC_TS={}, RUSTC={}.",
          option_env!("CARGO_PKG_VERSION").unwrap_or("unknown"),
          env!("GIT_BRANCH"),
          env!("GIT_COMMIT_SHORT"),
          env!("GIT_DIRTY"),
          env!("SOURCE_TIMESTAMP"),
          env!("RUSTC_VERSION"));
}
