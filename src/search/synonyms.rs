use std::collections::{BTreeSet, HashMap};

/// Built-in groups of interchangeable terms. A word listed in more than one
/// group resolves to the group listed last.
pub const SYNONYM_GROUPS: &[&[&str]] = &[
    // Actions
    &["add", "new", "create", "make", "mk", "generate", "insert", "append"],
    &["remove", "delete", "erase", "rm", "del", "unset", "discard", "drop"],
    &["find", "search", "locate", "look for", "query", "seek", "grep", "filter"],
    &[
        "show", "display", "list", "view", "print", "cat", "echo", "ls", "output", "get",
        "retrieve", "fetch",
    ],
    &["edit", "modify", "change", "update", "set", "alter", "revise"],
    &["copy", "cp", "duplicate", "clone"],
    &["move", "mv", "rename", "relocate"],
    &["run", "execute", "exec", "start", "launch", "invoke", "initiate"],
    &["stop", "kill", "terminate", "halt", "end", "cancel"],
    &["install", "setup", "deploy", "get"],
    &["uninstall", "remove software", "purge"],
    &["update", "upgrade", "patch", "refresh", "sync", "synchronize"],
    &["ssh", "login", "access"],
    &["disconnect", "logout", "exit"],
    &["download", "fetch", "get", "pull"],
    &["upload", "push", "send", "put"],
    &["compress", "zip", "archive", "tar", "gzip", "bzip2", "pack"],
    &["decompress", "unzip", "untar", "extract", "unpack"],
    &["mount", "attach"],
    &["unmount", "detach", "eject"],
    &["check", "verify", "validate", "test", "inspect"],
    &["compare", "diff", "contrast"],
    &["merge", "combine", "join"],
    &["split", "divide", "separate"],
    &["backup", "save", "dump"],
    &["restore", "recover", "load"],
    &["monitor", "watch", "observe", "track"],
    &["clear", "clean", "reset"],
    &["convert", "transform", "change format"],

    // Objects and qualifiers
    &["file", "files", "document", "documents", "item", "object"],
    &["directory", "dir", "folder", "path", "location"],
    &[
        "config", "configuration", "settings", "preferences", "prefs", "conf", "params",
        "parameters",
    ],
    &["process", "processes", "task", "tasks", "proc", "job", "service", "daemon"],
    &["log", "logs", "history", "journal", "audit", "event", "events"],
    &["network", "net", "connection", "lan", "wan"],
    &["user", "users", "account", "accounts", "profile"],
    &["permission", "permissions", "rights", "access control", "acl", "chmod", "chown"],
    &["package", "packages", "software", "app", "application", "program", "tool", "utility"],
    &["script", "scripts", "automation", "batch"],
    &["key", "keys", "ssh-key", "gpg-key", "secret", "password", "credential"],
    &["large", "big", "huge", "massive", "size"],
    &["small", "tiny", "little", "mini"],
    &["all", "every", "everything", "complete", "entire"],
    &["active", "running", "enabled", "current", "live"],
    &["inactive", "stopped", "disabled"],
    &["remote", "server", "host", "cloud"],
    &["local", "localhost", "desktop", "workstation"],
    &["text", "string", "content", "pattern"],
    &["image", "picture", "photo", "img"],
    &["video", "movie", "clip", "vid"],
    &["audio", "sound", "music", "snd"],
    &["port", "ports", "socket"],
    &["version", "release", "ver"],
    &["system", "sys", "os", "operating system", "machine", "host"],
    &["disk", "storage", "drive", "partition", "space", "hdd", "ssd"],
    &["memory", "mem", "ram"],
    &["cpu", "processor"],
    &["date", "time", "timestamp", "when"],
    &["error", "errors", "issue", "problem", "bug", "failure", "exception"],
    &["status", "state", "info", "information", "details"],
    &["output", "result", "response"],
    &["input", "argument", "parameter"],
    &["temporary", "temp", "tmp"],
    &["default", "standard", "normal"],
    &["interface", "adapter", "nic"],

    // Common tools
    &["ls", "list files", "list directory"],
    &["cd", "change directory"],
    &["pwd", "print working directory", "current path"],
    &["grep", "search text", "find in files", "filter content"],
    &["find", "find files", "search files by name"],
    &["awk", "text processing", "column processing"],
    &["sed", "stream editor", "text manipulation"],
    &["tar", "tape archive", "archiver"],
    &["zip", "zipper", "compress files"],
    &["git", "version control", "source control", "repo", "repository"],
    &["docker", "container", "containers", "virtualization"],
    &["ssh", "secure shell", "remote login", "remote access"],
    &["scp", "secure copy", "remote copy"],
    &["rsync", "remote sync", "file synchronization"],
    &["curl", "client url", "http request", "download url"],
    &["wget", "web get", "download file"],
    &["ping", "network test", "check host"],
    &["netstat", "network statistics", "listening ports"],
    &["ss", "socket statistics", "show connections"],
    &["top", "processes usage", "system monitor"],
    &["htop", "interactive top"],
    &["ps", "process status", "list processes"],
    &["kill", "terminate process"],
    &["df", "disk free", "filesystem space"],
    &["du", "disk usage", "file size"],
    &["chmod", "change mode", "set permissions"],
    &["chown", "change owner"],
    &["sudo", "superuser do", "run as root", "elevate privilege"],
    &["apt", "apt-get", "debian package manager", "ubuntu package manager"],
    &["yum", "centos package manager", "redhat package manager", "dnf"],
    &["brew", "homebrew", "macos package manager"],
    &["make", "compile", "build"],
    &["vim", "vi", "text editor"],
    &["nano", "text editor"],
    &["code", "vscode", "visual studio code"],
    &["python", "py"],
    &["node", "nodejs", "javascript runtime"],
    &["java", "jdk"],
    &["systemctl", "systemd control", "manage services"],
    &["journalctl", "journal control", "view logs"],

    // Programming vocabulary
    &["variable", "var", "env var"],
    &["function", "func", "method", "subroutine"],
    &["loop", "for loop", "while loop", "iterate"],
    &["conditional", "if statement", "if else"],
    &["array", "list", "sequence"],
    &["object", "dictionary", "map", "hash", "struct"],
    &["string", "text"],
    &["integer", "int", "number"],
    &["float", "double", "decimal"],
    &["boolean", "bool", "true", "false"],
    &["null", "none", "nil", "empty"],
    &["debug", "troubleshoot", "diagnose"],
    &["test", "testing", "unit test", "integration test"],
];

/// Immutable word -> synonym group map, built once and shared by reference.
#[derive(Debug, Clone, Default)]
pub struct SynonymLookup {
    groups: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl SynonymLookup {
    pub fn new(groups: &[&[&str]]) -> Self {
        let mut lookup = Self::default();
        for group in groups {
            let normalized: Vec<String> = group
                .iter()
                .map(|term| term.to_lowercase())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            let slot = lookup.groups.len();
            for term in &normalized {
                lookup.index.insert(term.clone(), slot);
            }
            lookup.groups.push(normalized);
        }
        lookup
    }

    pub fn builtin() -> Self {
        Self::new(SYNONYM_GROUPS)
    }

    /// Sorted, deduplicated group containing `word`, if any.
    pub fn group(&self, word: &str) -> Option<&[String]> {
        self.index
            .get(&word.to_lowercase())
            .map(|&slot| self.groups[slot].as_slice())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
