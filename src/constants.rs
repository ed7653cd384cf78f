//! # Constants
//!
//! Shared constants used throughout the connection form engine.
//!
//! Wire names and fixed endpoint paths mirror the admin server's contract
//! and must not change independently of it.

/// Provider key sent with every save request (`providerType=AWS`)
pub const AWS_PROVIDER_KEY: &str = "AWS";

/// Human-readable provider name, also the display-name default
pub const AWS_PROVIDER_NAME: &str = "Amazon Web Services (AWS)";

/// Marker parameter telling the save endpoint to persist the connection
pub const SAVE_CONNECTION_MARKER: &str = "save";

/// Length of the bullet placeholder shown for an already-saved secret
pub const PASSWORD_STUB_LEN: usize = 40;

/// Default IAM session tag for role-based connections
pub const DEFAULT_SESSION_NAME: &str = "BuildServer-session";

/// Fixed path of the test-connection endpoint
pub const TEST_CONNECTION_PATH: &str = "/repo/aws-test-connection.html";

/// Fixed path of the id-generation endpoint
pub const GENERATE_ID_PATH: &str = "generateId.html";

/// Object kind passed to the id-generation endpoint
pub const GENERATE_ID_OBJECT: &str = "awsConnection";

/// Project-settings page the form redirects to when the host supplies no
/// close callback
pub const DEFAULT_CLOSE_PATH: &str = "/admin/editProject.html";

/// Settings tab on the project page holding connection records
pub const CONNECTIONS_TAB: &str = "oauthConnections";

/// Documentation anchor for connection configuration
pub const CONNECTIONS_HELP_PAGE: &str = "?configuring-connections#AmazonWebServices";

/// First line of every test-connection report
pub const TEST_CONNECTION_PREFIX: &str = "Running STS get-caller-identity...\n";
