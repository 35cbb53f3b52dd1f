#![deny(warnings)]

// Tool registry and MCP tool definitions

use crate::config::Config;
use crate::error::{FileIoError, FopsError, McpError, Result};
use crate::operations::catfile::{self, Encoding};
use crate::operations::exec::{self, ExecOptions};
use crate::operations::gitignore;
use crate::operations::mkfile::{self, WriteFlag};
use crate::operations::mkfolder;
use crate::operations::rmfile;
use crate::operations::sandbox::Sandbox;
use crate::operations::script;
use crate::operations::unitsize::{storage_unit_lookup, StorageUnit, UnitSize};
use base64::Engine as _;
use serde::Serialize;
use serde_json::{Map, Value};

type Args = Map<String, Value>;

fn missing(name: &str) -> FopsError {
    McpError::InvalidToolParameters(format!("Missing required parameter: {}", name)).into()
}

fn required_str<'a>(args: &'a Args, name: &str) -> Result<&'a str> {
    args.get(name).and_then(|v| v.as_str()).ok_or_else(|| missing(name))
}

fn optional_str<'a>(args: &'a Args, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

/// `paths` may be a single string or an array of strings
fn paths_arg(args: &Args) -> Result<Vec<&str>> {
    match args.get("paths") {
        Some(Value::String(s)) => Ok(vec![s.as_str()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str().ok_or_else(|| {
                    FopsError::from(McpError::InvalidToolParameters(
                        "paths must contain only strings".to_string(),
                    ))
                })
            })
            .collect(),
        Some(_) => Err(McpError::InvalidToolParameters(
            "paths must be a string or an array of strings".to_string(),
        )
        .into()),
        None => Err(missing("paths")),
    }
}

fn text_result(text: &str) -> Value {
    serde_json::json!({
        "content": [{
            "type": "text",
            "text": text
        }]
    })
}

fn json_result<T: Serialize>(value: &T) -> Result<Value> {
    let text = serde_json::to_string(value).map_err(FopsError::Json)?;
    Ok(text_result(&text))
}

/// Tool registry that manages all available tools
pub struct ToolRegistry {
    config: Config,
    sandbox: Sandbox,
}

impl ToolRegistry {
    /// Create a registry whose operations are fenced to `config.root`
    pub fn new(config: Config) -> Result<Self> {
        let sandbox = Sandbox::new(&config.root)?;
        Ok(Self { config, sandbox })
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Get all tools in MCP format
    pub fn list_tools(&self) -> Value {
        serde_json::json!([
            {
                "name": "fops_mkfolder",
                "description": "Create a folder and any missing parents inside the sandbox root. Succeeds if it already exists.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Folder to create (relative paths resolve against the root)"
                        }
                    },
                    "required": ["path"]
                }
            },
            {
                "name": "fops_mkfile",
                "description": "Create, overwrite or append to a file inside the sandbox root. Parent folders are created; the file mode is applied afterwards.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "File to write"
                        },
                        "content": {
                            "type": "string",
                            "description": "Content to write"
                        },
                        "content_encoding": {
                            "type": "string",
                            "description": "How content is encoded: 'utf8' (default) or 'base64'",
                            "enum": ["utf8", "base64"]
                        },
                        "flag": {
                            "type": "string",
                            "description": "'w' to overwrite (default) or 'a' to append",
                            "enum": ["w", "a"]
                        },
                        "permissions": {
                            "type": "string",
                            "description": "Octal file mode, e.g. 744 or 0644 (default: 744)"
                        }
                    },
                    "required": ["path", "content"]
                }
            },
            {
                "name": "fops_rmfile",
                "description": "Remove files or folders recursively. Missing paths are not an error. Glob patterns are expanded.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "paths": {
                            "description": "A path or an array of paths",
                            "oneOf": [
                                { "type": "string" },
                                { "type": "array", "items": { "type": "string" } }
                            ]
                        }
                    },
                    "required": ["paths"]
                }
            },
            {
                "name": "fops_catfile",
                "description": "Read files and folders recursively. Returns a tree of file descriptors (content, encoding, mime, size, timestamps); unreadable paths become not_found records.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "paths": {
                            "description": "A path or an array of file and folder paths",
                            "oneOf": [
                                { "type": "string" },
                                { "type": "array", "items": { "type": "string" } }
                            ]
                        },
                        "encoding": {
                            "type": "string",
                            "description": "Content encoding (default: base64)",
                            "enum": ["base64", "utf8", "hex", "ascii", "latin1"]
                        }
                    },
                    "required": ["paths"]
                }
            },
            {
                "name": "fops_open_files",
                "description": "Like fops_catfile, but returns a flat list of file descriptors and not_found records.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "paths": {
                            "description": "A path or an array of file and folder paths",
                            "oneOf": [
                                { "type": "string" },
                                { "type": "array", "items": { "type": "string" } }
                            ]
                        },
                        "encoding": {
                            "type": "string",
                            "description": "Content encoding (default: base64)",
                            "enum": ["base64", "utf8", "hex", "ascii", "latin1"]
                        }
                    },
                    "required": ["paths"]
                }
            },
            {
                "name": "fops_mkgitignore",
                "description": "Merge rules into a .gitignore, appending only lines that are not already present.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Folder containing the .gitignore, or the .gitignore itself"
                        },
                        "rules": {
                            "type": "string",
                            "description": "Rule lines, one per line; indentation is ignored"
                        }
                    },
                    "required": ["path", "rules"]
                }
            },
            {
                "name": "fops_mkscript",
                "description": "Write a command as an executable shell script. Requires script generation to be enabled.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Script file to create"
                        },
                        "command": {
                            "type": "string",
                            "description": "Shell command(s) for the script body"
                        }
                    },
                    "required": ["path", "command"]
                }
            },
            {
                "name": "fops_runscript",
                "description": "Run command(s) through a temporary shell script in the sandbox root. Requires script generation to be enabled.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "Shell command(s) to run"
                        }
                    },
                    "required": ["command"]
                }
            },
            {
                "name": "fops_exec",
                "description": "Run a shell command synchronously in the sandbox root. Returns success, exit code, stdout and stderr.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "Command line passed to the system shell"
                        },
                        "env": {
                            "type": "object",
                            "description": "Extra environment variables",
                            "additionalProperties": { "type": "string" }
                        }
                    },
                    "required": ["command"]
                }
            },
            {
                "name": "fops_unitsize",
                "description": "Convert a storage size between units and render it human readable.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "value": {
                            "description": "A number, or a string such as '1.5 MB'",
                            "oneOf": [
                                { "type": "number" },
                                { "type": "string" }
                            ]
                        },
                        "unit": {
                            "type": "string",
                            "description": "Unit of a numeric value (default: byte)",
                            "enum": ["byte", "kilobyte", "megabyte", "gigabyte", "terabyte", "petabyte"]
                        }
                    },
                    "required": ["value"]
                }
            }
        ])
    }

    /// Execute a tool by name
    pub async fn execute_tool(&self, name: &str, arguments: &Value) -> Result<Value> {
        let args = arguments.as_object().ok_or_else(|| {
            McpError::InvalidToolParameters("Arguments must be an object".to_string())
        })?;

        tracing::debug!(tool = name, "tool call");

        match name {
            "fops_mkfolder" => {
                let path = required_str(args, "path")?;
                let created = mkfolder::mkfolder(&self.sandbox, path)?;
                json_result(&serde_json::json!({
                    "path": self.sandbox.resolve(path)?,
                    "first_created": created,
                }))
            }
            "fops_mkfile" => {
                let path = required_str(args, "path")?;
                let content = required_str(args, "content")?;
                let bytes = match optional_str(args, "content_encoding").unwrap_or("utf8") {
                    "utf8" | "utf-8" => content.as_bytes().to_vec(),
                    "base64" => base64::engine::general_purpose::STANDARD
                        .decode(content)
                        .map_err(|e| {
                            McpError::InvalidToolParameters(format!("Invalid base64 content: {}", e))
                        })?,
                    other => {
                        return Err(
                            FileIoError::InvalidEncoding(format!("content_encoding '{}'", other)).into(),
                        )
                    }
                };
                let flag = match optional_str(args, "flag") {
                    Some(flag) => flag.parse::<WriteFlag>()?,
                    None => WriteFlag::default(),
                };
                let permissions = match optional_str(args, "permissions") {
                    Some(mode) => mkfile::parse_mode(mode)?,
                    None => self.config.file_mode,
                };

                let written = mkfile::mkfile(&self.sandbox, path, &bytes, flag, permissions)?;
                Ok(text_result(&format!("File written: {}", written.display())))
            }
            "fops_rmfile" => {
                let paths = paths_arg(args)?;
                let results = rmfile::rmfile(&self.sandbox, &paths)?;
                json_result(&results)
            }
            "fops_catfile" | "fops_open_files" => {
                let paths = paths_arg(args)?;
                let encoding = match optional_str(args, "encoding") {
                    Some(enc) => enc.parse::<Encoding>()?,
                    None => self.config.default_encoding,
                };
                let entries = if name == "fops_catfile" {
                    catfile::catfile(&self.sandbox, &paths, encoding)
                } else {
                    catfile::open_files(&self.sandbox, &paths, encoding)
                };
                json_result(&entries)
            }
            "fops_mkgitignore" => {
                let path = required_str(args, "path")?;
                let rules = required_str(args, "rules")?;
                let merge = gitignore::mkgitignore(&self.sandbox, path, rules)?;
                json_result(&merge)
            }
            "fops_mkscript" => {
                let path = required_str(args, "path")?;
                let command = required_str(args, "command")?;
                let written = script::mkscript(&self.config, &self.sandbox, path, command)?;
                Ok(text_result(&format!("Script written: {}", written.display())))
            }
            "fops_runscript" => {
                let command = required_str(args, "command")?;
                let result = script::runscript(&self.config, &self.sandbox, command)?;
                json_result(&result)
            }
            "fops_exec" => {
                let command = required_str(args, "command")?;
                let mut options = ExecOptions {
                    cwd: Some(self.sandbox.root().to_path_buf()),
                    ..Default::default()
                };
                if let Some(env) = args.get("env").and_then(|v| v.as_object()) {
                    for (key, value) in env {
                        let value = value.as_str().ok_or_else(|| {
                            McpError::InvalidToolParameters(format!(
                                "env value for {} must be a string",
                                key
                            ))
                        })?;
                        options.env.insert(key.clone(), value.to_string());
                    }
                }
                let result = exec::exec(command, &options);
                json_result(&result)
            }
            "fops_unitsize" => {
                let size = match args.get("value") {
                    Some(Value::String(s)) => s.parse::<UnitSize>()?,
                    Some(Value::Number(n)) => {
                        let unit = match optional_str(args, "unit") {
                            Some(unit) => unit.parse::<StorageUnit>()?,
                            None => StorageUnit::Byte,
                        };
                        let value = n.as_f64().ok_or_else(|| {
                            FileIoError::InvalidUnit(format!("Unrepresentable value: {}", n))
                        })?;
                        let mut size = UnitSize::new();
                        size.set(unit, value);
                        size
                    }
                    Some(_) => {
                        return Err(McpError::InvalidToolParameters(
                            "value must be a number or a string".to_string(),
                        )
                        .into())
                    }
                    None => return Err(missing("value")),
                };

                let units: Map<String, Value> = size
                    .table()
                    .into_iter()
                    .map(|(unit, v)| (unit.name().to_string(), serde_json::json!(v)))
                    .collect();
                json_result(&serde_json::json!({
                    "bytes": size.bytes(),
                    "human": storage_unit_lookup(size.bytes()),
                    "units": units,
                }))
            }
            _ => Err(McpError::ToolNotFound(name.to_string()).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn registry() -> (TempDir, ToolRegistry) {
        let dir = TempDir::new().unwrap();
        let config = Config {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let registry = ToolRegistry::new(config).unwrap();
        (dir, registry)
    }

    fn text_of(result: &Value) -> String {
        result["content"][0]["text"].as_str().unwrap().to_string()
    }

    #[test]
    fn test_list_tools_names() {
        let (_dir, registry) = registry();
        let tools = registry.list_tools();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 10);
        assert!(names.contains(&"fops_catfile"));
        assert!(names.contains(&"fops_exec"));
    }

    #[tokio::test]
    async fn test_mkfile_then_catfile() {
        let (_dir, registry) = registry();
        registry
            .execute_tool(
                "fops_mkfile",
                &json!({"path": "foo/bar.txt", "content": "hello world\n", "flag": "a", "permissions": "644"}),
            )
            .await
            .unwrap();

        let result = registry
            .execute_tool("fops_catfile", &json!({"paths": "foo/bar.txt", "encoding": "utf8"}))
            .await
            .unwrap();
        let entries: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(entries[0]["kind"], "file");
        assert_eq!(entries[0]["name"], "bar.txt");
        assert_eq!(entries[0]["content"], "hello world\n");
        assert_eq!(entries[0]["size"], "12 B");
    }

    #[tokio::test]
    async fn test_mkfile_base64_content() {
        let (_dir, registry) = registry();
        registry
            .execute_tool(
                "fops_mkfile",
                &json!({"path": "bin.dat", "content": "AAEC", "content_encoding": "base64"}),
            )
            .await
            .unwrap();
        let bytes = fs::read(registry.sandbox().root().join("bin.dat")).unwrap();
        assert_eq!(bytes, vec![0u8, 1, 2]);
    }

    #[tokio::test]
    async fn test_open_files_reports_missing() {
        let (_dir, registry) = registry();
        let result = registry
            .execute_tool("fops_open_files", &json!({"paths": ["nope.txt"]}))
            .await
            .unwrap();
        let entries: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(entries[0]["kind"], "not_found");
    }

    #[tokio::test]
    async fn test_unitsize_tool() {
        let (_dir, registry) = registry();
        let result = registry
            .execute_tool("fops_unitsize", &json!({"value": 1, "unit": "megabyte"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(v["bytes"], 1_048_576);
        assert_eq!(v["human"], "1 MB");
        assert_eq!(v["units"]["kilobyte"], 1024.0);

        let result = registry
            .execute_tool("fops_unitsize", &json!({"value": "1.5 KB"}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(v["bytes"], 1536);
    }

    #[tokio::test]
    async fn test_missing_parameter() {
        let (_dir, registry) = registry();
        let err = registry
            .execute_tool("fops_mkfile", &json!({"path": "x"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (_dir, registry) = registry();
        let err = registry
            .execute_tool("fops_nope", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, FopsError::Mcp(McpError::ToolNotFound(_))));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_exec_tool_runs_in_root() {
        let (_dir, registry) = registry();
        fs::write(registry.sandbox().root().join("seen.txt"), "").unwrap();
        let result = registry
            .execute_tool("fops_exec", &json!({"command": "ls && echo $X", "env": {"X": "y"}}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&text_of(&result)).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["stdout"], "seen.txt\ny\n");
    }
}
