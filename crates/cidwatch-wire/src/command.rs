//! Outbound control lines.

use std::fmt;

use serde::Serialize;

/// Client name reported in `CONNECT`. The stream expects its browser client.
pub const CLIENT_LANG: &str = "nats.ws";
/// Client version reported in `CONNECT`.
pub const CLIENT_VERSION: &str = "1.30.3";

/// Credentials for the `CONNECT` handshake. Mutually exclusive.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Auth {
    /// No credentials.
    #[default]
    None,
    /// Username with an optional password.
    UserPass {
        /// Username.
        user: String,
        /// Password.
        pass: Option<String>,
    },
    /// Bare auth token.
    Token(String),
    /// User JWT with an optional nonce signature.
    Jwt {
        /// The JWT.
        jwt: String,
        /// Signature accompanying it.
        sig: Option<String>,
    },
}

impl Auth {
    /// Pick one credential set. Precedence: JWT, then token, then
    /// username/password. A password without a username is ignored.
    pub fn select(
        user: Option<String>,
        pass: Option<String>,
        token: Option<String>,
        jwt: Option<String>,
        sig: Option<String>,
    ) -> Self {
        if let Some(jwt) = jwt {
            return Self::Jwt { jwt, sig };
        }
        if let Some(token) = token {
            return Self::Token(token);
        }
        match user {
            Some(user) => Self::UserPass { user, pass },
            None => Self::None,
        }
    }

    /// Kind of credential, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::UserPass { .. } => "user_pass",
            Self::Token(_) => "token",
            Self::Jwt { .. } => "jwt",
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Auth({})", self.kind())
    }
}

/// The JSON object sent with `CONNECT`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectOptions {
    /// Ask for `+OK` after every command.
    pub verbose: bool,
    /// Strict subject checking.
    pub pedantic: bool,
    /// Protocol level; `1` enables async `INFO`.
    pub protocol: u8,
    /// Client implementation name.
    pub lang: String,
    /// Client implementation version.
    pub version: String,
    /// Accept `HMSG`.
    pub headers: bool,
    /// Ask for no-responders status messages.
    pub no_responders: bool,
    #[serde(skip)]
    auth: Auth,
}

impl ConnectOptions {
    /// Handshake options carrying `auth`.
    pub fn new(auth: Auth) -> Self {
        Self {
            verbose: false,
            pedantic: false,
            protocol: 1,
            lang: CLIENT_LANG.to_string(),
            version: CLIENT_VERSION.to_string(),
            headers: true,
            no_responders: true,
            auth,
        }
    }

    /// Credentials carried by this handshake.
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    fn to_json(&self) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(map) = value.as_object_mut() {
            let mut put = |key: &str, val: &str| {
                let _ = map.insert(key.to_string(), val.into());
            };
            match &self.auth {
                Auth::None => {}
                Auth::UserPass { user, pass } => {
                    put("user", user);
                    if let Some(pass) = pass {
                        put("pass", pass);
                    }
                }
                Auth::Token(token) => put("auth_token", token),
                Auth::Jwt { jwt, sig } => {
                    put("jwt", jwt);
                    if let Some(sig) = sig {
                        put("sig", sig);
                    }
                }
            }
        }
        serde_json::to_string(&value)
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new(Auth::None)
    }
}

/// A control line the client sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientCommand {
    /// `CONNECT <json>`
    Connect(ConnectOptions),
    /// `SUB <subject> <sid>`
    Sub {
        /// Subject filter.
        subject: String,
        /// Subscription id.
        sid: String,
    },
    /// `PING`
    Ping,
    /// `PONG`
    Pong,
}

impl ClientCommand {
    /// `SUB` shorthand.
    pub fn sub(subject: impl Into<String>, sid: impl Into<String>) -> Self {
        Self::Sub {
            subject: subject.into(),
            sid: sid.into(),
        }
    }

    /// Leading verb, safe to log.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Connect(_) => "CONNECT",
            Self::Sub { .. } => "SUB",
            Self::Ping => "PING",
            Self::Pong => "PONG",
        }
    }

    /// The full line including its `\r\n` terminator.
    pub fn to_line(&self) -> String {
        format!("{self}\r\n")
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect(options) => {
                let json = options.to_json().map_err(|_| fmt::Error)?;
                write!(f, "CONNECT {json}")
            }
            Self::Sub { subject, sid } => write!(f, "SUB {subject} {sid}"),
            Self::Ping => f.write_str("PING"),
            Self::Pong => f.write_str("PONG"),
        }
    }
}
