/// Control program used when none is configured
pub const IPVSADM: &str = "ipvsadm";

/// Line markers of the bulk dump/restore format
pub const ADD_SERVICE: &str = "-A";
pub const ADD_SERVICE_LONG: &str = "--add-service";
pub const ADD_SERVER: &str = "-a";
pub const ADD_SERVER_LONG: &str = "--add-server";

/// Command verbs
pub const EDIT_SERVICE: &str = "-E";
pub const DELETE_SERVICE: &str = "-D";
pub const EDIT_SERVER: &str = "-e";
pub const DELETE_SERVER: &str = "-d";
pub const CLEAR: &str = "-C";
pub const RESTORE: &str = "-R";
pub const SAVE: &str = "-S";
pub const NUMERIC: &str = "-n";
pub const ZERO: &str = "-Z";
pub const SET_TIMEOUTS: &str = "--set";
pub const START_DAEMON: &str = "--start-daemon";
pub const STOP_DAEMON: &str = "--stop-daemon";
pub const MCAST_INTERFACE: &str = "--mcast-interface";
pub const SYNC_ID: &str = "--syncid";

/// Option flags, short spellings (the form emitted when encoding)
pub const SCHEDULER: &str = "-s";
pub const PERSISTENT: &str = "-p";
pub const NETMASK: &str = "-M";
pub const REAL_SERVER: &str = "-r";
pub const WEIGHT: &str = "-w";
pub const UPPER_THRESHOLD: &str = "-x";
pub const LOWER_THRESHOLD: &str = "-y";

/// Sync daemon roles
pub const ROLE_MASTER: &str = "master";
pub const ROLE_BACKUP: &str = "backup";

/// Persistence applied when a dump does not state one
pub const DEFAULT_PERSISTENCE: u32 = 300;

/// Weight of a server that does not state one
pub const DEFAULT_WEIGHT: u32 = 1;
