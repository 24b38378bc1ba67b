use anyhow::bail;
use clap::Parser;
use tasker_tonic_core::{
    DEFAULT_PAGE_SIZE, TaskId,
    tasker::{DEFAULT_ID_ATTEMPTS, Keyspace, MAX_PAGE_SIZE, PageLimits, PageTokenCodec},
};

/// Runtime configuration for the `tasker-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is honoured), with defaults suitable for a single node.
#[derive(Parser, Clone)]
#[command(
    name = "tasker-tonic-server",
    version,
    about = "A gRPC service for task records with time-ordered IDs"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/tasker.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Node number embedded in every task id (0-255).
    ///
    /// Every process sharing a store must use a distinct node number; the
    /// service cannot detect two processes configured with the same one.
    ///
    /// Environment variable: `NODE_ID`
    #[arg(long, env = "NODE_ID", default_value_t = 0)]
    pub node_id: u64,

    /// Prefix of primary entry keys (`{prefix}:{id}`).
    ///
    /// Environment variable: `KEY_PREFIX`
    #[arg(long, env = "KEY_PREFIX", default_value_t = String::from("taskID"))]
    pub key_prefix: String,

    /// Sorted set holding the id of every task.
    ///
    /// Environment variable: `INDEX_KEY`
    #[arg(long, env = "INDEX_KEY", default_value_t = String::from("sortSet"))]
    pub index_key: String,

    /// Page size used when neither the request nor its token names one.
    ///
    /// Environment variable: `DEFAULT_PAGE_SIZE`
    #[arg(long, env = "DEFAULT_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub default_page_size: usize,

    /// Upper bound applied to every page size.
    ///
    /// Environment variable: `MAX_PAGE_SIZE`
    #[arg(long, env = "MAX_PAGE_SIZE", default_value_t = MAX_PAGE_SIZE)]
    pub max_page_size: usize,

    /// Generator attempts per create before reporting id exhaustion.
    ///
    /// Environment variable: `ID_ATTEMPTS`
    #[arg(long, env = "ID_ATTEMPTS", default_value_t = DEFAULT_ID_ATTEMPTS)]
    pub id_attempts: usize,

    /// Secret used to sign page tokens.
    ///
    /// Nodes sharing a secret accept each other's tokens. When unset a random
    /// key is drawn at startup and tokens die with the process.
    ///
    /// Environment variable: `PAGE_TOKEN_SECRET`
    #[arg(long, env = "PAGE_TOKEN_SECRET", hide_env_values = true)]
    pub page_token_secret: Option<String>,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub node_id: u64,
    pub keyspace: Keyspace,
    pub page_limits: PageLimits,
    pub id_attempts: usize,
    page_token_secret: Option<String>,
}

impl ServerConfig {
    /// The page token codec for this node.
    pub fn page_token_codec(&self) -> PageTokenCodec {
        match &self.page_token_secret {
            Some(secret) => PageTokenCodec::from_secret(secret.as_bytes()),
            None => PageTokenCodec::with_random_key(),
        }
    }
}

impl core::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("server_addr", &self.server_addr)
            .field("uds", &self.uds)
            .field("node_id", &self.node_id)
            .field("keyspace", &self.keyspace)
            .field("page_limits", &self.page_limits)
            .field("id_attempts", &self.id_attempts)
            .field(
                "page_token_secret",
                &self.page_token_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.node_id > TaskId::NODE_MASK {
            bail!(
                "NODE_ID ({}) exceeds the node field of the task id (max = {})",
                args.node_id,
                TaskId::NODE_MASK
            );
        }

        if args.key_prefix.trim().is_empty() {
            bail!("KEY_PREFIX must not be empty");
        }

        if args.index_key.trim().is_empty() {
            bail!("INDEX_KEY must not be empty");
        }

        if args.default_page_size == 0 {
            bail!("DEFAULT_PAGE_SIZE must be greater than 0");
        }

        if args.default_page_size > args.max_page_size {
            bail!(
                "DEFAULT_PAGE_SIZE ({}) exceeds MAX_PAGE_SIZE ({})",
                args.default_page_size,
                args.max_page_size
            );
        }

        if args.id_attempts == 0 {
            bail!("ID_ATTEMPTS must be greater than 0");
        }

        let page_token_secret = args.page_token_secret.filter(|s| !s.is_empty());

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            node_id: args.node_id,
            keyspace: Keyspace::new(args.key_prefix, args.index_key),
            page_limits: PageLimits {
                default_size: args.default_page_size,
                max_size: args.max_page_size,
            },
            id_attempts: args.id_attempts,
            page_token_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = std::iter::once("tasker-tonic-server").chain(extra.iter().copied());
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn defaults_are_valid() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.node_id, 0);
        assert_eq!(config.keyspace, Keyspace::default());
        assert_eq!(config.page_limits, PageLimits::default());
        assert_eq!(config.id_attempts, DEFAULT_ID_ATTEMPTS);
    }

    #[test]
    fn node_must_fit_eight_bits() {
        assert!(parse(&["--node-id", "255"]).is_ok());
        let err = parse(&["--node-id", "256"]).unwrap_err();
        assert!(err.to_string().contains("NODE_ID"));
    }

    #[test]
    fn page_sizes_must_be_ordered() {
        assert!(parse(&["--default-page-size", "0"]).is_err());
        assert!(parse(&["--default-page-size", "50", "--max-page-size", "10"]).is_err());
        let config = parse(&["--default-page-size", "10", "--max-page-size", "10"]).unwrap();
        assert_eq!(config.page_limits.max_size, 10);
    }

    #[test]
    fn keys_must_not_be_blank() {
        assert!(parse(&["--key-prefix", " "]).is_err());
        assert!(parse(&["--index-key", ""]).is_err());
    }

    #[test]
    fn shared_secret_gives_shared_tokens() {
        let a = parse(&["--page-token-secret", "s3cret"]).unwrap();
        let b = parse(&["--page-token-secret", "s3cret"]).unwrap();
        let token = tasker_tonic_core::tasker::PageToken::new("1", 2);
        let encoded = a.page_token_codec().encode(&token);
        assert_eq!(b.page_token_codec().decode(&encoded), Ok(token));
        assert!(!format!("{a:?}").contains("s3cret"));
    }
}
