#![forbid(unsafe_code)]

use anyhow::{Result, anyhow};
use log::{info, error, LevelFilter};
use serde::Deserialize;
use std::{env, fs, path::Path};
use fs_mistrust::Mistrust;
use std::os::unix::fs::PermissionsExt;
use lazy_static::lazy_static;
use structopt::StructOpt;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config as LogConfig, Root};
use log4rs::encode::pattern::PatternEncoder;

// Haiku Utilities
use crate::utils::{haiku_utils, errors::Errors};

use super::haiku_utils::get_absolute_path;

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Directory and file locations. Unless otherwise noted, all files and directories
// are relative to the root directory.
const ENV_HAIKU_ROOT_DIR   : &str = "HAIKU_ROOT_DIR";
const DEFAULT_ROOT_DIR     : &str = "~/.haiku";
const CONFIG_DIR           : &str = "/config";
const LOGS_DIR             : &str = "/logs";
const CERTS_DIR            : &str = "/certs";
const LOG4RS_CONFIG_FILE   : &str = "/log4rs.yml";       // relative to config dir
const HAIKU_CONFIG_FILE    : &str = "/haiku.toml";       // relative to config dir
const DEFAULT_LOG_FILE     : &str = "/haiku_server.log"; // relative to logs dir
pub const CERT_FILE        : &str = "/cert.pem";         // relative to certs dir
pub const KEY_FILE         : &str = "/key.pem";          // relative to certs dir

// Networking.
const DEFAULT_HTTP_ADDR    : &str = "http://localhost";
const DEFAULT_HTTP_PORT    : u16  = 3000;

// Upstream text generation service.
const DEFAULT_AI_BASE_URL  : &str = "https://api.deepseek.com";
const DEFAULT_AI_MODEL     : &str = "deepseek-chat";
const DEFAULT_API_KEY_ENV  : &str = "DEEPSEEK_API_KEY";
const DEFAULT_TEMPERATURE  : f32  = 0.8;
const DEFAULT_MAX_TOKENS   : u32  = 100;

// Terminal session.
const DEFAULT_SIMULATED_DELAY_MS : u64 = 1500;

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// Assign the command line arguments BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref HAIKU_ARGS: HaikuArgs = init_haiku_args();
}

// Calculate the data directories BEFORE RUNTIME_CTX is initialized in main.
lazy_static! {
    pub static ref HAIKU_DIRS: HaikuDirs = init_haiku_dirs();
}

// ***************************************************************************
//                             Directory Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// HaikuDirs:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
pub struct HaikuDirs {
    pub root_dir: String,
    pub config_dir: String,
    pub logs_dir: String,
    pub certs_dir: String,
}

// ***************************************************************************
//                               Config Structs
// ***************************************************************************
// ---------------------------------------------------------------------------
// HaikuArgs:
// ---------------------------------------------------------------------------
#[derive(Debug, StructOpt)]
#[structopt(name = "haiku_args", about = "Command line arguments for the Haiku Server.")]
pub struct HaikuArgs {
    /// Specify the server's root data directory.
    ///
    /// This directory contains the configuration, log and certificate files.
    #[structopt(short, long)]
    pub root_dir: Option<String>,

    /// Create the data directories and then exit.
    ///
    /// The data directories will be rooted at a root directory calculated
    /// using the following priority order:
    ///
    ///   1. If set, the value of the HAIKU_ROOT_DIR environment,
    ///
    ///   2. Otherwise, if set, the value of the --root-dir command line argument,
    ///
    ///   3. Otherwise, ~/.haiku
    ///
    #[structopt(short, long)]
    pub create_dirs_only: bool,

    /// Run an interactive terminal session instead of the HTTP server.
    #[structopt(short, long)]
    pub session: bool,

    /// Generate through a running server's generate-haiku endpoint.
    ///
    /// Only used with --session.  Overrides session.server_url in haiku.toml.
    /// Without either, the session simulates generation locally.
    #[structopt(long)]
    pub server_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Parms:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct Parms {
    pub config_file: String,
    pub config: Config,
}

// ---------------------------------------------------------------------------
// RuntimeCtx:
// ---------------------------------------------------------------------------
#[derive(Debug)]
pub struct RuntimeCtx {
    pub parms: Parms,
    pub haiku_args: &'static HaikuArgs,
    pub haiku_dirs: &'static HaikuDirs,
}

// ---------------------------------------------------------------------------
// Config:
// ---------------------------------------------------------------------------
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub title: String,
    pub http_addr: String,
    pub http_port: u16,
    pub enable_tls: bool,
    pub ai: AiConfig,
    pub session: SessionConfig,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "Haiku Server".to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            enable_tls: false,
            ai: AiConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// AiConfig:
// ---------------------------------------------------------------------------
/// Upstream chat-completions service.  The credential itself is never part
/// of the configuration file, only the name of the variable that holds it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: Option<u64>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_AI_BASE_URL.to_string(),
            model: DEFAULT_AI_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: None,
        }
    }
}

impl AiConfig {
    // ---------------------------------------------------------------------------
    // get_api_key:
    // ---------------------------------------------------------------------------
    /** Read the credential from the configured environment variable.  An unset
     * or blank variable is an error; there is no built-in default.
     */
    pub fn get_api_key(&self) -> Result<String, Errors> {
        match env::var(&self.api_key_env) {
            Ok(k) if !k.trim().is_empty() => Ok(k.trim().to_string()),
            _ => Err(Errors::MissingApiKey(self.api_key_env.clone())),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig:
// ---------------------------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub simulated_delay_ms: u64,
    pub server_url: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulated_delay_ms: DEFAULT_SIMULATED_DELAY_MS,
            server_url: None,
        }
    }
}

// ***************************************************************************
//                            Directory Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_haiku_args:
// ---------------------------------------------------------------------------
/** Get the command line arguments. */
fn init_haiku_args() -> HaikuArgs {
    HaikuArgs::from_args()
}

// ---------------------------------------------------------------------------
// init_haiku_dirs:
// ---------------------------------------------------------------------------
/** Calculate the external data directories. */
fn init_haiku_dirs() -> HaikuDirs {
    let mistrust = get_mistrust();

    // Check that each path is absolute and is a directory with the
    // proper permission assign if it exists.  If it doesn't exist,
    // create it.
    let root_dir = get_root_dir();
    check_haiku_dir(&root_dir, "root directory", &mistrust);

    let config_dir = root_dir.clone() + CONFIG_DIR;
    check_haiku_dir(&config_dir, "config directory", &mistrust);

    let logs_dir = root_dir.clone() + LOGS_DIR;
    check_haiku_dir(&logs_dir, "logs directory", &mistrust);

    let certs_dir = root_dir.clone() + CERTS_DIR;
    check_haiku_dir(&certs_dir, "certs directory", &mistrust);

    HaikuDirs {root_dir, config_dir, logs_dir, certs_dir}
}

// ---------------------------------------------------------------------------
// check_haiku_dir:
// ---------------------------------------------------------------------------
/** Check that the path is absolute and, if it exists, that is has the proper
 * permissions assigned.  If it doesn't exist, create it.  The mistrust package
 * creates directories with 0o700 permissions.
 *
 * Any failure results in a panic.
 */
fn check_haiku_dir(dir: &String, msgname: &str, mistrust: &Mistrust) {
    let path = Path::new(dir);
    if !path.is_absolute() {
        panic!("The haiku {} path must be absolute: {}", msgname, dir);
    }
    if path.exists() {
        if !path.is_dir() {
            panic!("The haiku {} path must be a directory: {}", msgname, dir);
        }

        // Make sure the directory has rwx for owner only.
        let meta = path.metadata().unwrap_or_else(|_| panic!("Unable to read metadata for {}: {}", msgname, dir));
        let perm = meta.permissions().mode();
        if perm & 0o777 != 0o700 {
            panic!("The haiku {} path must be have 0o700 permissions: {}", msgname, dir);
        }
    } else if let Err(e) = mistrust.make_directory(path) {
        panic!("Make directory error for {:?}: {}", path, &e.to_string());
    }
}

// ---------------------------------------------------------------------------
// get_mistrust:
// ---------------------------------------------------------------------------
/** Configure a new mistrust object for initial directory processing. */
fn get_mistrust() -> Mistrust {
    match Mistrust::builder()
        .ignore_prefix(get_absolute_path("~"))
        .trust_group(0)
        .build() {
            Ok(m) => m,
            Err(e) => {
                panic!("Mistrust configuration error: {}", &e.to_string());
            }
        }
}

// ---------------------------------------------------------------------------
// get_root_dir:
// ---------------------------------------------------------------------------
fn get_root_dir() -> String {
    // Order of precedence:
    //  1. Environment variable
    //  2. Command line --root-dir argument
    //  3. Default location
    //
    let root_dir = env::var(ENV_HAIKU_ROOT_DIR).unwrap_or_else(
        |_| {
            match HAIKU_ARGS.root_dir.clone() {
                Some(r) => r,
                None => DEFAULT_ROOT_DIR.to_string(),
            }
        });

    get_absolute_path(&root_dir)
}

// ***************************************************************************
//                               Log Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_log:
// ---------------------------------------------------------------------------
/** Initialize log4rs from the configuration directory's log4rs.yml.  When
 * that file doesn't exist, log at info level to a file in the logs directory
 * so that terminal sessions aren't interleaved with log output.
 */
pub fn init_log() {
    let logconfig = init_log_config();
    if Path::new(&logconfig).exists() {
        if let Err(e) = log4rs::init_file(logconfig.clone(), Default::default()) {
            println!("{}", e);
            let s = format!("{}", Errors::Log4rsInitialization(logconfig));
            panic!("{}", s);
        }
        info!("Log4rs initialized using: {}", logconfig);
    } else {
        let logfile = HAIKU_DIRS.logs_dir.clone() + DEFAULT_LOG_FILE;
        if let Err(e) = init_default_log(&logfile) {
            println!("{}", e);
            let s = format!("{}", Errors::Log4rsInitialization(logfile));
            panic!("{}", s);
        }
        info!("Log4rs initialized with built-in configuration writing to: {}", logfile);
    }
}

// ---------------------------------------------------------------------------
// init_log_config:
// ---------------------------------------------------------------------------
fn init_log_config() -> String {
    HAIKU_DIRS.config_dir.clone() + LOG4RS_CONFIG_FILE
}

// ---------------------------------------------------------------------------
// init_default_log:
// ---------------------------------------------------------------------------
fn init_default_log(logfile: &str) -> Result<()> {
    let appender = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%Y-%m-%dT%H:%M:%S%.3f%Z)} {l} {t} - {m}{n}")))
        .build(logfile)?;
    let config = LogConfig::builder()
        .appender(Appender::builder().build("logfile", Box::new(appender)))
        .build(Root::builder().appender("logfile").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

// ***************************************************************************
//                             Parms Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// get_parms:
// ---------------------------------------------------------------------------
/** Retrieve the application parameters from the configuration file in the
 * config directory.  If the file cannot be read, default values are used.
 */
fn get_parms() -> Result<Parms> {
    let config_file = HAIKU_DIRS.config_dir.clone() + HAIKU_CONFIG_FILE;

    // Read the configuration file.
    let config_file_abs = haiku_utils::get_absolute_path(&config_file);
    info!("{}", Errors::ReadingConfigFile(config_file_abs.clone()));
    let contents = match fs::read_to_string(&config_file_abs) {
        Ok(c) => c,
        Err(_) => {
            info!("Unable to read configuration at {}. Using default values.", config_file);
            return Ok(Parms { config_file: Default::default(), config: Config::new() });
        }
    };

    let config = parse_config(&contents).map_err(|e| {
        let msg = format!("{}\n   {}", Errors::TOMLParseError(config_file_abs.clone()), e);
        error!("{}", msg);
        anyhow!(msg)
    })?;

    Ok(Parms { config_file: config_file_abs, config })
}

// ---------------------------------------------------------------------------
// parse_config:
// ---------------------------------------------------------------------------
/** Parse haiku.toml content.  Missing keys take their default values. */
pub fn parse_config(contents: &str) -> Result<Config, toml::de::Error> {
    toml::from_str(contents)
}

// ***************************************************************************
//                             Config Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// init_runtime_context:
// ---------------------------------------------------------------------------
pub fn init_runtime_context() -> RuntimeCtx {
    // The application aborts if the configuration can't be parsed.
    let parms = get_parms().expect("FAILED to read configuration file.");
    RuntimeCtx {parms, haiku_args: &HAIKU_ARGS, haiku_dirs: &HAIKU_DIRS}
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = Config::new();
        assert_eq!(c.http_port, 3000);
        assert!(!c.enable_tls);
        assert_eq!(c.ai.base_url, "https://api.deepseek.com");
        assert_eq!(c.ai.model, "deepseek-chat");
        assert_eq!(c.ai.max_tokens, 100);
        assert!((c.ai.temperature - 0.8).abs() < f32::EPSILON);
        assert_eq!(c.session.simulated_delay_ms, 1500);
        assert!(c.session.server_url.is_none());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = parse_config(r#"
            http_port = 8080

            [ai]
            model = "other-model"
            timeout_secs = 20

            [session]
            server_url = "http://localhost:8080/api/generate-haiku"
        "#).unwrap();
        assert_eq!(c.http_port, 8080);
        assert_eq!(c.title, "Haiku Server");
        assert_eq!(c.ai.model, "other-model");
        assert_eq!(c.ai.base_url, "https://api.deepseek.com");
        assert_eq!(c.ai.timeout_secs, Some(20));
        assert_eq!(c.session.simulated_delay_ms, 1500);
        assert_eq!(c.session.server_url.as_deref(), Some("http://localhost:8080/api/generate-haiku"));
    }

    #[test]
    fn bad_toml_is_rejected() {
        assert!(parse_config("http_port = \"not a number\"").is_err());
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let ai = AiConfig {
            api_key_env: "HAIKU_TEST_SURELY_UNSET_API_KEY".to_string(),
            ..AiConfig::default()
        };
        match ai.get_api_key() {
            Err(Errors::MissingApiKey(name)) => assert_eq!(name, "HAIKU_TEST_SURELY_UNSET_API_KEY"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
