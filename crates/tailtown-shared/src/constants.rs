/// Application name
pub const APP_NAME: &str = "TailTown";

/// Separator placed between the two identities of a chat id
pub const CHAT_ID_SEPARATOR: char = '_';

/// Number of identity characters used when synthesizing a display label
pub const SHORT_ID_LEN: usize = 6;

/// Role label stored in a chat snapshot when the participant has none
pub const DEFAULT_PARTICIPANT_ROLE: &str = "User";

/// Role assumed for the local party when contacting a seller
pub const DEFAULT_LOCAL_ROLE: &str = "Buyer";

/// Role label shown for a seller whose profile has no role
pub const DEFAULT_SELLER_ROLE: &str = "Seller";

/// Role label shown when seller information could not be resolved
pub const UNKNOWN_ROLE: &str = "Unknown";

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;
