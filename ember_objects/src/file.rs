//! Parsing of a single `.object` definition file.

use std::path::PathBuf;

use ember_common::hash::hash32;

use crate::event::{Event, EVENT_COUNT, EVENT_FUNCTIONS};
use crate::keyword::{
    find_closing_brace, find_in, find_keyword_parentheses, is_event_keyword, is_word_delimiter,
    line_at, Keyword, KeywordId, KEYWORDS, KEYWORD_COUNT, KEYWORD_REQUIREMENTS, KW_ABSTRACT, KW_BUCKET_SIZE,
    KW_CATEGORY, KW_CONSTRUCTOR, KW_COUNT, KW_DESERIALIZE, KW_FRIEND, KW_GLOBAL, KW_HASH,
    KW_HEADER_INCLUDES, KW_INCLUDES, KW_NETWORKED, KW_OBJECT, KW_PARENT, KW_PRIVATE,
    KW_PROTECTED, KW_PUBLIC, KW_READ, KW_SERIALIZE, KW_SOURCE_INCLUDES, KW_VERSIONS, KW_WRITE,
};
use crate::{ObjectError, Registry};

/// The implicit root of the inheritance forest. Every object without an
/// explicit `PARENT` inherits from `DEFAULT`.
pub const DEFAULT_DEFINITION: &str = r"
OBJECT( DEFAULT )
ABSTRACT( true )

PUBLIC ObjectInstance id;

EVENT_CREATE MANUAL
{
	/* do nothing */
}

EVENT_DESTROY MANUAL
{
	/* do nothing */
}
";

#[derive(Clone, Debug)]
pub struct ObjectFile {
    /// Empty for the embedded DEFAULT definition.
    pub path: PathBuf,
    pub name: String,
    pub type_name: String,
    pub name_parent: String,
    pub type_parent: String,
    pub type_parent_full: String,

    /// Index into the owning object list; linked during resolve.
    pub parent: Option<usize>,
    pub children: Vec<usize>,

    pub keywords: Vec<Keyword>,
    pub events: [Event; EVENT_COUNT],

    /// Category name hashes this object belongs to.
    pub categories: Vec<u32>,
    pub friends: Vec<String>,

    pub constructor_has_default: bool,
    pub constructor_header: Vec<String>,
    pub constructor_source: Vec<String>,

    pub write_source: String,
    pub read_source: String,
    pub serialize_source: String,
    pub deserialize_source: String,
    pub versions_header: String,
    pub has_write_read: bool,
    pub has_serialize: bool,

    pub private_variable_header: Vec<String>,
    pub protected_variable_header: Vec<String>,
    pub public_variable_header: Vec<String>,
    pub private_function_header: Vec<String>,
    pub protected_function_header: Vec<String>,
    pub public_function_header: Vec<String>,
    pub private_function_source: Vec<String>,
    pub protected_function_source: Vec<String>,
    pub public_function_source: Vec<String>,
    pub global_variable_header: Vec<String>,
    pub global_variable_source: Vec<String>,
    pub global_function_header: Vec<String>,
    pub global_function_source: Vec<String>,

    pub hash: String,
    pub hash_hex: String,
    pub is_abstract: bool,
    pub networked: bool,
    pub count_max: u64,
    pub bucket_size: u64,

    pub depth: u16,
    pub visited: bool,

    pub inherited_variables: Vec<String>,
    pub inherited_functions: Vec<String>,
    pub inherited_events: Vec<String>,
}

impl Default for ObjectFile {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            name: String::new(),
            type_name: String::new(),
            // Objects without an explicit PARENT inherit from DEFAULT.
            name_parent: "DEFAULT".to_owned(),
            type_parent: "DEFAULT_t".to_owned(),
            type_parent_full: "CoreObjects::DEFAULT_t".to_owned(),
            parent: None,
            children: Vec::new(),
            keywords: Vec::new(),
            events: Default::default(),
            categories: Vec::new(),
            friends: Vec::new(),
            constructor_has_default: false,
            constructor_header: Vec::new(),
            constructor_source: Vec::new(),
            write_source: String::new(),
            read_source: String::new(),
            serialize_source: String::new(),
            deserialize_source: String::new(),
            versions_header: String::new(),
            has_write_read: false,
            has_serialize: false,
            private_variable_header: Vec::new(),
            protected_variable_header: Vec::new(),
            public_variable_header: Vec::new(),
            private_function_header: Vec::new(),
            protected_function_header: Vec::new(),
            public_function_header: Vec::new(),
            private_function_source: Vec::new(),
            protected_function_source: Vec::new(),
            public_function_source: Vec::new(),
            global_variable_header: Vec::new(),
            global_variable_source: Vec::new(),
            global_function_header: Vec::new(),
            global_function_source: Vec::new(),
            hash: String::new(),
            hash_hex: String::new(),
            is_abstract: false,
            networked: false,
            count_max: u64::from(u32::MAX),
            bucket_size: 64,
            depth: 0,
            visited: false,
            inherited_variables: Vec::new(),
            inherited_functions: Vec::new(),
            inherited_events: Vec::new(),
        }
    }
}

impl ObjectFile {
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    pub fn instantiable(&self) -> bool {
        !self.is_abstract
    }

    fn display_path(&self) -> String {
        if self.path.as_os_str().is_empty() {
            "DEFAULT".to_owned()
        } else {
            self.path.display().to_string()
        }
    }

    fn error(&self, buffer: &str, position: usize, message: impl Into<String>) -> ObjectError {
        ObjectError::Parse {
            path: self.display_path(),
            line: line_at(buffer, position),
            message: message.into(),
        }
    }

    /// Reads and parses the definition, filling every parse-state field.
    pub fn parse(&mut self, registry: &mut Registry) -> Result<(), ObjectError> {
        let buffer = if self.name == "DEFAULT" {
            DEFAULT_DEFINITION.to_owned()
        } else {
            std::fs::read_to_string(&self.path).map_err(|err| ObjectError::Open {
                path: self.display_path(),
                err,
            })?
        };

        tracing::debug!("parse {}", self.display_path());
        self.parse_buffer(&buffer, registry)
    }

    pub fn parse_buffer(&mut self, buffer: &str, registry: &mut Registry) -> Result<(), ObjectError> {
        self.parse_keywords(buffer)?;
        self.parse_keyword_values(buffer, registry)?;
        self.parse_keyword_code(buffer, registry)?;
        Ok(())
    }

    /// Single linear pass splitting the buffer into (keyword, body) pairs.
    fn parse_keywords(&mut self, buffer: &str) -> Result<(), ObjectError> {
        let bytes = buffer.as_bytes();
        let mut counts = [0i32; KEYWORD_COUNT];

        let mut current = 0;
        while current < bytes.len() {
            // Comments
            if bytes[current] == b'/' {
                if bytes[current..].starts_with(b"//") {
                    match find_in(buffer, "\n", current, buffer.len()) {
                        Some(newline) => {
                            current = newline;
                            continue;
                        }
                        None => break,
                    }
                }
                if bytes[current..].starts_with(b"/*") {
                    match find_in(buffer, "*/", current, buffer.len()) {
                        Some(close) => {
                            current = close + 2;
                            continue;
                        }
                        None => break,
                    }
                }
            }

            // Keywords are all uppercase.
            if !bytes[current].is_ascii_uppercase() {
                current += 1;
                continue;
            }

            let matched = KEYWORDS
                .iter()
                .position(|kw| bytes[current..].starts_with(kw.as_bytes()));
            let Some(id) = matched else {
                current += 1;
                continue;
            };

            // A keyword must be a stand-alone word.
            let prev = if current > 0 { bytes[current - 1] } else { b' ' };
            let post = bytes
                .get(current + KEYWORDS[id].len())
                .copied()
                .unwrap_or(b' ');
            if !is_word_delimiter(prev) || !is_word_delimiter(post) {
                current += 1;
                continue;
            }

            // The previous keyword's body ends where this one starts.
            if let Some(previous) = self.keywords.last_mut() {
                previous.end = current;
            }

            let start = current + KEYWORDS[id].len();
            self.keywords.push(Keyword {
                id,
                start,
                end: buffer.len(),
            });
            counts[id] += 1;
            current = start;
        }

        // Requirements
        for id in 0..KEYWORD_COUNT {
            let requirements = KEYWORD_REQUIREMENTS[id];
            if requirements.required && counts[id] < 1 {
                return Err(self.error(
                    buffer,
                    0,
                    format!("object must have at least 1 '{}'", KEYWORDS[id]),
                ));
            }
            if requirements.max_count != -1 && counts[id] > requirements.max_count {
                return Err(self.error(
                    buffer,
                    0,
                    format!(
                        "object can only have {} '{}'",
                        requirements.max_count, KEYWORDS[id]
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Processes value-shaped keywords: `KEYWORD( literal )`.
    fn parse_keyword_values(
        &mut self,
        buffer: &str,
        registry: &mut Registry,
    ) -> Result<(), ObjectError> {
        for index in 0..self.keywords.len() {
            let keyword = self.keywords[index];
            match keyword.id {
                KW_OBJECT => {
                    let name = self.parentheses_string(buffer, &keyword, true)?;
                    if name.is_empty() {
                        return Err(self.error(
                            buffer,
                            keyword.start,
                            format!("{}() must be a valid string!", KEYWORDS[KW_OBJECT]),
                        ));
                    }
                    self.name = name;
                    self.type_name = format!("{}_t", self.name);
                    let key = hash32(&self.type_name);
                    if registry.object_types.contains_key(&key) {
                        return Err(self.error(buffer, keyword.start, "duplicate object name!"));
                    }
                    registry.object_types.insert(key, self.type_name.clone());
                }

                KW_PARENT => {
                    let mut parent = self.parentheses_string(buffer, &keyword, false)?;
                    if parent.is_empty() {
                        parent = "DEFAULT".to_owned();
                    }
                    self.name_parent = parent;
                    self.type_parent = format!("{}_t", self.name_parent);
                    self.type_parent_full = format!("CoreObjects::{}", self.type_parent);
                }

                KW_COUNT => {
                    let value = self.parentheses_i64(buffer, &keyword)?;
                    if value < 0 || value > i64::from(u32::MAX) {
                        return Err(self.error(
                            buffer,
                            keyword.start,
                            format!(
                                "{}() must be range 1 - {}",
                                KEYWORDS[KW_COUNT],
                                u32::MAX
                            ),
                        ));
                    }
                    if value == 0 {
                        return Err(self.error(
                            buffer,
                            keyword.start,
                            format!(
                                "{}() must be range 1 - {}. Use {}( true ) if desired size is 0",
                                KEYWORDS[KW_COUNT],
                                u32::MAX,
                                KEYWORDS[KW_ABSTRACT]
                            ),
                        ));
                    }
                    self.count_max = value as u64;
                }

                KW_BUCKET_SIZE => {
                    let value = self.parentheses_i64(buffer, &keyword)?;
                    if value < 0 || value > i64::from(u16::MAX) {
                        return Err(self.error(
                            buffer,
                            keyword.start,
                            format!(
                                "{}() must be range 1 - {}",
                                KEYWORDS[KW_BUCKET_SIZE],
                                u16::MAX
                            ),
                        ));
                    }
                    if value == 0 {
                        return Err(self.error(
                            buffer,
                            keyword.start,
                            format!(
                                "{}() must be range 1 - {}. Use {}( true ) if desired size is 0",
                                KEYWORDS[KW_BUCKET_SIZE],
                                u16::MAX,
                                KEYWORDS[KW_ABSTRACT]
                            ),
                        ));
                    }
                    self.bucket_size = value as u64;
                }

                KW_HASH => {
                    let hash = self.parentheses_string(buffer, &keyword, true)?;
                    if hash.is_empty() {
                        return Err(self.error(
                            buffer,
                            keyword.start,
                            format!("{}() must be a valid string!", KEYWORDS[KW_HASH]),
                        ));
                    }
                    self.hash = hash;
                }

                KW_CATEGORY => self.keyword_category(buffer, &keyword, registry)?,
                KW_VERSIONS => self.keyword_versions(buffer, &keyword)?,
                KW_ABSTRACT => self.is_abstract = self.parentheses_bool(buffer, &keyword)?,
                KW_NETWORKED => self.networked = self.parentheses_bool(buffer, &keyword)?,

                _ => {}
            }
        }

        Ok(())
    }

    /// Processes code-shaped keywords: braced bodies and declarations.
    fn parse_keyword_code(
        &mut self,
        buffer: &str,
        registry: &mut Registry,
    ) -> Result<(), ObjectError> {
        for index in 0..self.keywords.len() {
            let keyword = self.keywords[index];

            if is_event_keyword(keyword.id) {
                self.keyword_event(buffer, &keyword)?;
                continue;
            }

            match keyword.id {
                KW_INCLUDES | KW_HEADER_INCLUDES | KW_SOURCE_INCLUDES => {
                    self.keyword_includes(buffer, &keyword, registry)?;
                }
                KW_CONSTRUCTOR => self.keyword_constructor(buffer, &keyword)?,
                KW_WRITE => self.keyword_write(buffer, &keyword)?,
                KW_READ => self.keyword_read(buffer, &keyword)?,
                KW_SERIALIZE => self.keyword_serialize(buffer, &keyword)?,
                KW_DESERIALIZE => self.keyword_deserialize(buffer, &keyword)?,
                KW_PRIVATE | KW_PROTECTED | KW_PUBLIC | KW_GLOBAL => {
                    self.keyword_member(buffer, &keyword)?;
                }
                KW_FRIEND => self.keyword_friend(buffer, &keyword)?,
                _ => {}
            }
        }

        Ok(())
    }

    fn parentheses_string(
        &self,
        buffer: &str,
        keyword: &Keyword,
        required: bool,
    ) -> Result<String, ObjectError> {
        match find_keyword_parentheses(buffer, keyword.start, keyword.end) {
            Some((open, close)) => Ok(buffer[open + 1..close].trim().to_owned()),
            None if required => Err(self.error(
                buffer,
                keyword.start,
                format!("{}(...) must not be empty!", KEYWORDS[keyword.id]),
            )),
            None => Ok(String::new()),
        }
    }

    fn parentheses_i64(&self, buffer: &str, keyword: &Keyword) -> Result<i64, ObjectError> {
        let value = self.parentheses_string(buffer, keyword, false)?;
        if value.is_empty() {
            return Ok(0);
        }
        value.parse().map_err(|_| {
            self.error(
                buffer,
                keyword.start,
                format!("{}() must be an integer", KEYWORDS[keyword.id]),
            )
        })
    }

    fn parentheses_bool(&self, buffer: &str, keyword: &Keyword) -> Result<bool, ObjectError> {
        let value = self.parentheses_string(buffer, keyword, false)?;
        match value.as_str() {
            "" | "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(self.error(
                buffer,
                keyword.start,
                format!("invalid boolean parentheses for keyword {value}"),
            )),
        }
    }

    fn keyword_includes(
        &mut self,
        buffer: &str,
        keyword: &Keyword,
        registry: &mut Registry,
    ) -> Result<(), ObjectError> {
        let mut start = find_in(buffer, "#i", keyword.start, keyword.end);
        while let Some(position) = start {
            let end = find_in(buffer, "\n", position, buffer.len()).ok_or_else(|| {
                self.error(
                    buffer,
                    keyword.start,
                    format!("{} #include has no endline", KEYWORDS[keyword.id]),
                )
            })?;

            let include = &buffer[position..end];
            let includes = if keyword.id == KW_SOURCE_INCLUDES {
                &mut registry.source_includes
            } else {
                &mut registry.header_includes
            };
            if !includes.contains(include) {
                includes.push_str(include);
                includes.push('\n');
            }

            start = find_in(buffer, "#i", position + 1, keyword.end);
        }

        Ok(())
    }

    fn scope_range(
        &self,
        buffer: &str,
        keyword: &Keyword,
    ) -> Result<(usize, usize), ObjectError> {
        let invalid = || {
            self.error(
                buffer,
                keyword.start,
                format!("'{}' has invalid scope", KEYWORDS[keyword.id]),
            )
        };

        let scope_end = find_closing_brace(buffer, keyword.start, keyword.end).ok_or_else(invalid)?;
        let scope_start = find_in(buffer, "{", keyword.start, keyword.end).ok_or_else(invalid)?;
        Ok((scope_start, scope_end))
    }

    fn keyword_constructor(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let (scope_start, scope_end) = self.scope_range(buffer, keyword)?;
        let scope = &buffer[scope_start..=scope_end];

        let mut arguments = match find_keyword_parentheses(buffer, keyword.start, scope_start) {
            Some((open, close)) => buffer[open + 1..close].trim().to_owned(),
            None => String::new(),
        };

        if arguments.is_empty() {
            if self.constructor_has_default {
                return Err(self.error(
                    buffer,
                    keyword.start,
                    "Object already has a specified default constructor!",
                ));
            }
            self.constructor_has_default = true;
            arguments = "()".to_owned();
        } else {
            arguments = format!("( {arguments} )");
        }

        self.constructor_source.push(format!(
            "CoreObjects::{type_name}::{type_name}{arguments}\n{scope}\n",
            type_name = self.type_name
        ));
        self.constructor_header
            .push(format!("{}{arguments};", self.type_name));
        Ok(())
    }

    fn keyword_write(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let (scope_start, scope_end) = self.scope_range(buffer, keyword)?;
        self.write_source
            .push_str(&buffer[scope_start + 1..scope_end]);
        self.write_source.push('\n');
        self.has_write_read = true;
        Ok(())
    }

    fn keyword_read(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let (scope_start, scope_end) = self.scope_range(buffer, keyword)?;
        self.read_source
            .push_str(&buffer[scope_start + 1..scope_end]);
        self.read_source.push('\n');
        self.has_write_read = true;
        Ok(())
    }

    fn keyword_serialize(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let (scope_start, scope_end) = self.scope_range(buffer, keyword)?;
        self.serialize_source
            .push_str(buffer[scope_start + 1..scope_end].trim());
        if self.serialize_source.is_empty() {
            self.serialize_source.push_str("// ...");
        }
        self.has_serialize = true;
        Ok(())
    }

    fn keyword_deserialize(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let (scope_start, scope_end) = self.scope_range(buffer, keyword)?;
        self.deserialize_source
            .push_str(buffer[scope_start + 1..scope_end].trim());
        if self.deserialize_source.is_empty() {
            self.deserialize_source.push_str("// ...");
        }
        self.has_serialize = true;
        Ok(())
    }

    fn keyword_event(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let event_id = keyword.id;
        self.events[event_id].inherits = true;
        self.events[event_id].implements = true;
        let modifiers_start = keyword.start;

        let (scope_start, scope_end) = self.scope_range(buffer, keyword)?;

        // Modifiers sit between the keyword and the opening brace.
        if find_in(buffer, "DISABLE", modifiers_start, scope_start).is_some() {
            let event = &mut self.events[event_id];
            event.inherits = false;
            event.implements = false;
            event.disabled = true;
            event.manual = true;

            let signature = EVENT_FUNCTIONS[event_id];
            let ret = if signature.return_value.is_empty() {
                "return".to_owned()
            } else {
                format!("return {}", signature.return_value)
            };
            event.null = format!(
                "inline {} {}{} {{ {ret}; }}",
                signature.return_type, signature.name, signature.params
            );
            return Ok(());
        }

        self.events[event_id].manual =
            find_in(buffer, "MANUAL", modifiers_start, scope_start).is_some();
        self.events[event_id].noinherit =
            find_in(buffer, "NOINHERIT", modifiers_start, scope_start).is_some();

        self.events[event_id]
            .source
            .push_str(&buffer[scope_start + 1..scope_end]);

        let signature = EVENT_FUNCTIONS[event_id];
        self.events[event_id].header = format!(
            "{} {}{};",
            signature.return_type, signature.name, signature.params
        );
        Ok(())
    }

    /// PRIVATE / PROTECTED / PUBLIC / GLOBAL bodies: either a function
    /// (has a brace scope before the terminating `;`) or a declaration.
    fn keyword_member(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let start = keyword.start;
        let end = keyword.end;

        let semicolon = find_in(buffer, ";", start, end).unwrap_or(usize::MAX);
        let opening_brace = find_in(buffer, "{", start, end).unwrap_or(usize::MAX);
        let closing_brace = find_closing_brace(buffer, start, end);

        let is_function = match closing_brace {
            None => false,
            Some(close) => !(semicolon < opening_brace || buffer[close..].starts_with("};")),
        };

        if keyword.id != KW_GLOBAL {
            if is_function {
                let close = closing_brace.unwrap();
                let end = close + 1;

                let mut function_source = buffer[start..end].trim().to_owned();
                let open_brace = find_in(&function_source, "{", 0, function_source.len())
                    .ok_or_else(|| {
                        self.error(buffer, start, "function declaration: invalid/missing scope")
                    })?;
                let mut function_header = function_source[..open_brace].trim().to_owned();

                // Qualify the function name for the source file:
                // "int foo() { ... }" -> "int CoreObjects::Type_t::foo() { ... }"
                function_source.push('\n');
                let paren = find_in(&function_source, "(", 0, open_brace).ok_or_else(|| {
                    self.error(
                        buffer,
                        start,
                        "function declaration: invalid/missing parameter parentheses",
                    )
                })?;
                if paren == 0 {
                    return Err(self.error(
                        buffer,
                        keyword.start,
                        "function declaration: no return type",
                    ));
                }
                let bytes = function_source.as_bytes();
                let mut current = paren - 1;
                let mut on_name = false;
                loop {
                    if current == 0 {
                        return Err(self.error(
                            buffer,
                            keyword.start,
                            "function declaration: no return type",
                        ));
                    }
                    let whitespace = bytes[current].is_ascii_whitespace();
                    if whitespace && on_name {
                        current += 1;
                        break;
                    }
                    current -= 1;
                    on_name |= !whitespace;
                }
                function_source
                    .insert_str(current, &format!("CoreObjects::{}::", self.type_name));

                function_header.push(';');

                let (header, source) = match keyword.id {
                    KW_PRIVATE => (
                        &mut self.private_function_header,
                        &mut self.private_function_source,
                    ),
                    KW_PROTECTED => (
                        &mut self.protected_function_header,
                        &mut self.protected_function_source,
                    ),
                    _ => (
                        &mut self.public_function_header,
                        &mut self.public_function_source,
                    ),
                };
                source.push(function_source);
                header.push(function_header);
            } else {
                let mut end = find_in(buffer, ";", start, end).ok_or_else(|| {
                    self.error(
                        buffer,
                        keyword.start,
                        "declaration: missing terminating semicolon",
                    )
                })? + 1;

                // Type declarations keep their whole brace scope.
                let is_variable = !(find_in(buffer, "struct", start, end).is_some()
                    || find_in(buffer, "class", start, end).is_some()
                    || find_in(buffer, "enum", start, end).is_some());
                if !is_variable {
                    end = find_closing_brace(buffer, start, buffer.len()).ok_or_else(|| {
                        self.error(buffer, keyword.start, "declaration: missing scope braces")
                    })? + 2;
                }

                let expression = buffer[start..end.min(buffer.len())]
                    .trim()
                    .replace('\n', "\n\t");

                let header = match keyword.id {
                    KW_PRIVATE => &mut self.private_variable_header,
                    KW_PROTECTED => &mut self.protected_variable_header,
                    _ => &mut self.public_variable_header,
                };
                header.push(expression);
            }
        } else if is_function {
            let close = closing_brace.unwrap();
            let end = close + 1;

            let mut function_source = buffer[start..end].trim().to_owned();
            function_source.push('\n');

            let open_brace =
                find_in(&function_source, "{", 0, function_source.len()).ok_or_else(|| {
                    self.error(
                        buffer,
                        keyword.start,
                        "function declaration: invalid/missing scope",
                    )
                })?;
            let mut function_header = function_source[..open_brace].trim().to_owned();
            function_header.insert_str(0, "extern ");
            function_header.push_str(";\n");

            self.global_function_source.push(function_source);
            self.global_function_header.push(function_header);
        } else {
            let mut end = find_in(buffer, ";", start, end).ok_or_else(|| {
                self.error(
                    buffer,
                    keyword.start,
                    "declaration: missing terminating semicolon",
                )
            })? + 1;

            let is_variable = !(find_in(buffer, "struct", start, end).is_some()
                || find_in(buffer, "class", start, end).is_some()
                || find_in(buffer, "enum", start, end).is_some());
            if !is_variable {
                end = find_closing_brace(buffer, start, buffer.len()).ok_or_else(|| {
                    self.error(buffer, keyword.start, "declaration: missing scope braces")
                })? + 2;
            }

            let expression_source = buffer[start..end.min(buffer.len())].trim().to_owned();
            let mut expression_header = expression_source.clone();

            if is_variable {
                // Header form drops the initializer: "extern int value;"
                let end_brace = expression_header.find('{').unwrap_or(usize::MAX);
                let end_semicolon = expression_header.find(';').unwrap_or(usize::MAX);
                let end_assignment = expression_header.find('=').unwrap_or(usize::MAX);
                let end_index = end_brace.min(end_semicolon).min(end_assignment);
                if end_index == usize::MAX {
                    return Err(self.error(
                        buffer,
                        keyword.start,
                        "declaration: missing '{ }', '=', or ';'",
                    ));
                }
                expression_header.truncate(end_index);

                // DVAR macros only exist in the source file.
                if expression_header.starts_with("DVAR") {
                    self.global_variable_source
                        .push(format!("static {expression_source}"));
                    return Ok(());
                }

                let trimmed = expression_header.trim();
                self.global_variable_header
                    .push(format!("extern {trimmed};\n"));
                self.global_variable_source.push(expression_source);
            } else {
                expression_header.push('\n');
                self.global_variable_header.push(expression_header);
            }
        }

        Ok(())
    }

    fn keyword_friend(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let (open, close) = find_keyword_parentheses(buffer, keyword.start, keyword.end)
            .ok_or_else(|| {
                self.error(
                    buffer,
                    keyword.start,
                    format!("{}(...) must not be empty!", KEYWORDS[KW_FRIEND]),
                )
            })?;

        let mut found = false;
        for friend in buffer[open + 1..close].split(',') {
            let friend = friend.trim();
            if friend.is_empty() {
                continue;
            }
            if !self.friends.iter().any(|f| f == friend) {
                self.friends.push(friend.to_owned());
            }
            found = true;
        }

        if !found {
            return Err(self.error(
                buffer,
                keyword.start,
                format!("{}(...) must not be empty!", KEYWORDS[KW_FRIEND]),
            ));
        }
        Ok(())
    }

    fn keyword_category(
        &mut self,
        buffer: &str,
        keyword: &Keyword,
        registry: &mut Registry,
    ) -> Result<(), ObjectError> {
        let (open, close) = find_keyword_parentheses(buffer, keyword.start, keyword.end)
            .ok_or_else(|| {
                self.error(
                    buffer,
                    keyword.start,
                    format!("{}(...) must not be empty!", KEYWORDS[KW_CATEGORY]),
                )
            })?;

        for category in buffer[open + 1..close].split(',') {
            let category = category.trim();
            if category.is_empty() {
                continue;
            }

            let hash = hash32(category);
            if !self.categories.contains(&hash) {
                self.categories.push(hash);
            }
            registry.register_category(hash, category);
        }

        Ok(())
    }

    fn keyword_versions(&mut self, buffer: &str, keyword: &Keyword) -> Result<(), ObjectError> {
        let (open, close) = find_keyword_parentheses(buffer, keyword.start, keyword.end)
            .ok_or_else(|| {
                self.error(
                    buffer,
                    keyword.start,
                    format!("{}(...) must not be empty!", KEYWORDS[KW_VERSIONS]),
                )
            })?;

        self.versions_header.push_str("\tenum\n\t{\n\t\t");
        for version in buffer[open + 1..close].split(',') {
            let version = version.trim();
            if !version.is_empty() {
                self.versions_header.push_str(version);
                self.versions_header.push_str(",\n\t\t");
            }
        }
        self.versions_header.push_str("VERSION_COUNT\n\t};\n");
        Ok(())
    }

    /// Post-parse validation: hash defaults and keyword pairing rules.
    pub fn validate(&mut self) -> Result<(), ObjectError> {
        if self.hash.is_empty() {
            self.hash = self.name.clone();
        }
        self.hash_hex = format!("0x{:08X}", hash32(&self.hash));

        let pair = |a: &str, b: &str, name: &str, kw_a: KeywordId, kw_b: KeywordId| {
            if !a.is_empty() && b.is_empty() {
                Err(ObjectError::Validate(format!(
                    "{name} has {} function but missing corresponding {} function",
                    KEYWORDS[kw_a], KEYWORDS[kw_b]
                )))
            } else {
                Ok(())
            }
        };

        pair(&self.write_source, &self.read_source, &self.name, KW_WRITE, KW_READ)?;
        pair(&self.read_source, &self.write_source, &self.name, KW_READ, KW_WRITE)?;

        if !self.versions_header.is_empty() {
            if self.serialize_source.is_empty() {
                return Err(ObjectError::Validate(format!(
                    "{} has {}(...) enums but missing {} function!",
                    self.name,
                    KEYWORDS[KW_VERSIONS],
                    KEYWORDS[KW_SERIALIZE]
                )));
            }
            if self.deserialize_source.is_empty() {
                return Err(ObjectError::Validate(format!(
                    "{} has {}(...) enums but missing {} function!",
                    self.name,
                    KEYWORDS[KW_VERSIONS],
                    KEYWORDS[KW_DESERIALIZE]
                )));
            }
        } else {
            if !self.serialize_source.is_empty() {
                return Err(ObjectError::Validate(format!(
                    "{} has {} function but missing {}(...) enums!",
                    self.name,
                    KEYWORDS[KW_SERIALIZE],
                    KEYWORDS[KW_VERSIONS]
                )));
            }
            if !self.deserialize_source.is_empty() {
                return Err(ObjectError::Validate(format!(
                    "{} has {} function but missing {}(...) enums!",
                    self.name,
                    KEYWORDS[KW_DESERIALIZE],
                    KEYWORDS[KW_VERSIONS]
                )));
            }
        }

        pair(
            &self.serialize_source,
            &self.deserialize_source,
            &self.name,
            KW_SERIALIZE,
            KW_DESERIALIZE,
        )?;
        pair(
            &self.deserialize_source,
            &self.serialize_source,
            &self.name,
            KW_DESERIALIZE,
            KW_SERIALIZE,
        )?;

        if self.networked && (self.serialize_source.is_empty() || self.deserialize_source.is_empty())
        {
            return Err(ObjectError::Validate(format!(
                "{} marked as {}, but missing required {} & {} functions",
                self.name,
                KEYWORDS[KW_NETWORKED],
                KEYWORDS[KW_SERIALIZE],
                KEYWORDS[KW_DESERIALIZE]
            )));
        }

        Ok(())
    }
}
