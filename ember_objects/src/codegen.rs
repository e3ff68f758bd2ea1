//! Generated C++ output: class hierarchy, type tables, event dispatch.

use std::collections::HashSet;

use ember_common::hash::hash32;

use crate::event::{EVENT_COUNT, EVENT_FUNCTIONS};
use crate::file::ObjectFile;
use crate::keyword::KW_EVENT_CREATE;
use crate::{ObjectError, Objects};

pub const COMMENT_BREAK: &str = "////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////";

fn file_info(output: &mut String, generator: &str) {
    output.push_str(COMMENT_BREAK);
    output.push_str("\n\n/*\n");
    output.push_str(" * File generated by the asset build tool.\n");
    output.push_str(&format!(" * Refer to: ember_objects ({generator})\n"));
    output.push_str(" *\n * Do not edit by hand.\n */\n\n");
    output.push_str(COMMENT_BREAK);
    output.push_str("\n\n");
}

/// Emits `items` as a comma separated table body, wrapping lines.
fn append_wrapped(output: &mut String, indent: &str, items: &[String], per_line: usize) {
    output.push_str(indent);
    for (i, item) in items.iter().enumerate() {
        output.push_str(item);
        if i + 1 == items.len() {
            break;
        }
        if (i + 1) % per_line == 0 {
            output.push_str(",\n");
            output.push_str(indent);
        } else {
            output.push_str(", ");
        }
    }
    output.push('\n');
}

impl ObjectFile {
    /// The class definition and handle specialization for the header.
    fn write_header(&self, files: &[ObjectFile]) -> String {
        let mut output = String::new();
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n");

        // Global variables / data
        for var in &self.global_variable_header {
            output.push_str(var);
        }
        if !self.global_variable_header.is_empty() {
            output.push('\n');
        }

        output.push_str("__INTERNAL_OBJECT_SYSTEM_BEGIN\n");

        // Class definition
        output.push_str(&format!("class {}", self.type_name));
        if self.parent.is_some() {
            output.push_str(&format!(" : public {}", self.type_parent));
        }
        output.push_str("\n{\n");

        output.push_str(&format!(
            "\tfriend struct CoreObjects::OBJECT_ENCODER<Object::{}>;\n",
            self.name
        ));
        for friend in &self.friends {
            output.push_str(&format!("\tfriend {friend};\n"));
        }

        // Public
        output.push_str("public:\n");
        if !self.constructor_has_default {
            output.push_str(&format!("\t{}() = default;\n", self.type_name));
        }
        for ctor in &self.constructor_header {
            output.push_str(&format!("\t{ctor}\n"));
        }

        let parent = self.parent.map(|p| &files[p]);
        for var in &self.public_variable_header {
            // Only members unique to this object, factoring inheritance.
            if parent.is_none_or(|p| !p.inherited_variables.contains(var)) {
                output.push_str(&format!("\t{var}\n"));
            }
        }
        for function in &self.public_function_header {
            output.push_str(&format!("\tvirtual {function}\n"));
        }
        for event in &self.events {
            if !event.header.is_empty() {
                output.push_str(&format!("\tvirtual {}\n", event.header));
            }
        }

        // Protected
        output.push_str("protected:\n");
        for var in &self.protected_variable_header {
            if parent.is_none_or(|p| !p.inherited_variables.contains(var)) {
                output.push_str(&format!("\t{var}\n"));
            }
        }
        for function in &self.protected_function_header {
            output.push_str(&format!("\tvirtual {function}\n"));
        }

        // Private
        output.push_str("private:\n");
        if !self.versions_header.is_empty() {
            output.push_str(&self.versions_header);
        }
        if self.has_write_read {
            output.push_str("\tvoid _write( class Buffer &buffer );\n");
            output.push_str("\tbool _read( class Buffer &buffer );\n");
        }
        if self.has_serialize {
            output.push_str("\tvoid _serialize( class Buffer &buffer );\n");
            output.push_str("\tbool _deserialize( class Buffer &buffer );\n");
        }
        for var in &self.private_variable_header {
            output.push_str(&format!("\t{var}\n"));
        }
        for function in &self.private_function_header {
            output.push_str(&format!("\t{function}\n"));
        }
        for event in &self.events {
            if !event.null.is_empty() {
                output.push_str(&format!("\t{}\n\n", event.null));
            }
        }

        output.push_str("};\n\n");

        // Custom constructors get a variadic construct specialization.
        if !self.constructor_header.is_empty() {
            output.push_str(&format!(
                "\ntemplate <typename... Args> struct TYPE_CONSTRUCT_VARIADIC<Object::{}, Args...>\n{{\n",
                self.name
            ));
            output.push_str(&format!(
                "\tstatic void CONSTRUCT( void *object, Args... args ) {{ new ( object ) {}( args... ); }}\n}};\n",
                self.type_name
            ));
        }
        output.push_str("__INTERNAL_OBJECT_SYSTEM_END\n\n");

        // ObjectHandle
        output.push_str(&format!(
            "template <> struct ObjectHandle<Object::{}>\n{{\n",
            self.name
        ));
        output.push_str(&format!(
            "\tstatic CoreObjects::{} stub;\n",
            self.type_name
        ));
        output.push_str(&format!(
            "\tCoreObjects::{} *data = nullptr;\n",
            self.type_name
        ));
        output.push_str(&format!(
            "\tCoreObjects::{} *operator->() const {{ return UNLIKELY( data == nullptr ) ? &ObjectHandle<Object::{}>::stub : data; }}\n",
            self.type_name, self.name
        ));
        output.push_str("\texplicit operator bool() const { return data != nullptr; }\n");
        output.push_str(&format!(
            "\tObjectHandle( void *object ) {{ data = reinterpret_cast<CoreObjects::{} *>( object ); }}\n",
            self.type_name
        ));
        if self.has_write_read {
            output.push_str(&format!(
                "\tstatic void write( class Buffer &buffer, const ObjectHandle<Object::{}> &handle );\n",
                self.name
            ));
            output.push_str(&format!(
                "\tstatic bool read( class Buffer &buffer, ObjectHandle<Object::{}> &handle );\n",
                self.name
            ));
        }
        if self.has_serialize {
            output.push_str(&format!(
                "\tstatic void serialize( class Buffer &buffer, const ObjectHandle<Object::{}> &handle );\n",
                self.name
            ));
            output.push_str(&format!(
                "\tstatic bool deserialize( class Buffer &buffer, ObjectHandle<Object::{}> &handle );\n",
                self.name
            ));
        }
        output.push_str("};\n");

        // Global functions
        if !self.global_function_header.is_empty() {
            for function in &self.global_function_header {
                output.push_str(function);
            }
            output.push('\n');
        }
        output.push('\n');

        output
    }

    /// Member implementations for the source file.
    fn write_source(&self, files: &[ObjectFile]) -> String {
        let mut output = String::new();
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n");

        // Handle stub
        output.push_str(&format!(
            "CoreObjects::{} ObjectHandle<Object::{}>::stub = {{ }};\n\n",
            self.type_name, self.name
        ));

        // Global data
        for var in &self.global_variable_source {
            output.push_str(var);
            output.push('\n');
        }
        if !self.global_variable_source.is_empty() {
            output.push('\n');
        }

        // Encoder
        output.push_str(&format!(
            "template <> struct CoreObjects::OBJECT_ENCODER<Object::{}>\n{{\n",
            self.name
        ));
        output.push_str(&format!(
            "\tOBJECT_ENCODER( void *data ) : object {{ *reinterpret_cast<{} *>( data ) }} {{ }} {} &object;\n",
            self.type_name, self.type_name
        ));
        if self.has_write_read {
            output.push_str(&format!(
                "\tstatic void write( class Buffer &buffer, const OBJECT_ENCODER<Object::{}> &context ) {{ context.object._write( buffer ); }}\n",
                self.name
            ));
            output.push_str(&format!(
                "\tstatic bool read( class Buffer &buffer, OBJECT_ENCODER<Object::{}> &context ) {{ return context.object._read( buffer ); }}\n",
                self.name
            ));
        }
        if self.has_serialize {
            output.push_str(&format!(
                "\tstatic void serialize( class Buffer &buffer, const OBJECT_ENCODER<Object::{}> &context ) {{ context.object._serialize( buffer ); }}\n",
                self.name
            ));
            output.push_str(&format!(
                "\tstatic bool deserialize( class Buffer &buffer, OBJECT_ENCODER<Object::{}> &context ) {{ return context.object._deserialize( buffer ); }}\n",
                self.name
            ));
        }
        output.push_str("};\n\n");

        // Constructors
        for ctor in &self.constructor_source {
            output.push_str(ctor);
            output.push('\n');
        }

        // Write / Read
        if !self.write_source.is_empty() {
            output.push_str(&format!(
                "void CoreObjects::{}::_write( Buffer &buffer )\n{{\n",
                self.type_name
            ));
            output.push_str(&self.write_source);
            output.push_str("}\n\n");
        }
        if !self.read_source.is_empty() {
            output.push_str(&format!(
                "bool CoreObjects::{}::_read( Buffer &buffer )\n{{\n",
                self.type_name
            ));
            output.push_str(&self.read_source);
            output.push_str("\treturn true;\n}\n\n");
        }

        // Serialize / Deserialize
        if self.has_serialize {
            output.push_str(&format!(
                "void CoreObjects::{}::_serialize( Buffer &buffer )\n{{\n",
                self.type_name
            ));
            output.push_str("\tSerializer serializer;\n\tserializer.begin( buffer, VERSION_COUNT - 1 );\n\t");
            output.push_str(&self.serialize_source);
            output.push_str("\n\tserializer.end();\n}\n\n");

            output.push_str(&format!(
                "void ObjectHandle<Object::{}>::serialize( Buffer &buffer, const ObjectHandle<Object::{}> &handle )\n{{\n",
                self.name, self.name
            ));
            output.push_str("\tAssert( handle.data != nullptr );\n");
            output.push_str("\tSerializer serializer; serializer.begin( buffer, 0 );\n");
            for ancestor in self.serialized_chain(files) {
                output.push_str(&format!(
                    "\t{{ CoreObjects::OBJECT_ENCODER<Object::{}> slice {{ handle.data }}; serializer.write( {}, slice ); }}\n",
                    ancestor.name, ancestor.hash_hex
                ));
            }
            output.push_str("\tserializer.end();\n}\n\n");

            output.push_str(&format!(
                "bool CoreObjects::{}::_deserialize( Buffer &buffer )\n{{\n",
                self.type_name
            ));
            output.push_str("\tDeserializer deserializer;\n\tdeserializer.begin( buffer, VERSION_COUNT - 1 );\n\t");
            output.push_str(&self.deserialize_source);
            output.push_str("\n\tdeserializer.end();\n\treturn true;\n}\n\n");

            output.push_str(&format!(
                "bool ObjectHandle<Object::{}>::deserialize( Buffer &buffer, ObjectHandle<Object::{}> &handle )\n{{\n",
                self.name, self.name
            ));
            output.push_str("\tAssert( handle.data != nullptr );\n");
            output.push_str("\tDeserializer deserializer; deserializer.begin( buffer, 0 );\n");
            for ancestor in self.serialized_chain(files) {
                output.push_str(&format!(
                    "\t{{ CoreObjects::OBJECT_ENCODER<Object::{}> slice {{ handle.data }}; if( !deserializer.read( {}, slice ) ) {{ return false; }}; }}\n",
                    ancestor.name, ancestor.hash_hex
                ));
            }
            output.push_str("\tdeserializer.end();\n\treturn true;\n}\n\n");
        }

        // Events
        for (event_id, event) in self.events.iter().enumerate() {
            if !event.implements || event.disabled {
                continue;
            }

            let signature = EVENT_FUNCTIONS[event_id];
            output.push_str(&format!(
                "{} CoreObjects::{}::{}{}\n{{",
                signature.return_type, self.type_name, signature.name, signature.params
            ));

            // Call the nearest implementing ancestor below DEFAULT.
            if !event.noinherit {
                let mut parent = self.parent;
                while let Some(p) = parent {
                    let ancestor = &files[p];
                    if ancestor.name == "DEFAULT" {
                        break;
                    }
                    if !ancestor.events[event_id].implements {
                        parent = ancestor.parent;
                        continue;
                    }

                    output.push_str(&format!(
                        "\n\tCoreObjects::{}::{}{}",
                        ancestor.type_name, signature.name, signature.caller_args
                    ));
                    output.push_str(if event.source.is_empty() { ";\n" } else { ";" });
                    break;
                }
            }

            output.push_str(&event.source);
            output.push_str("}\n\n");
        }

        // Functions
        for function in &self.private_function_source {
            output.push_str(function);
            output.push('\n');
        }
        for function in &self.protected_function_source {
            output.push_str(function);
            output.push('\n');
        }
        for function in &self.public_function_source {
            output.push_str(function);
            output.push('\n');
        }
        for function in &self.global_function_source {
            output.push_str(function);
            output.push('\n');
        }

        // INHERIT resolves to the parent's qualified type.
        if self.name_parent != "DEFAULT" {
            output = output.replace("INHERIT", &self.type_parent_full);
        }

        output
    }

    /// This object and its ancestors that declare SERIALIZE, nearest
    /// first.
    fn serialized_chain<'a>(&'a self, files: &'a [ObjectFile]) -> Vec<&'a ObjectFile> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(file) = current {
            if file.has_serialize {
                chain.push(file);
            }
            current = file.parent.map(|p| &files[p]);
        }
        chain
    }
}

impl Objects {
    /// `objects.system.generated.hpp`: the Object and ObjectCategory
    /// enums plus their counts.
    pub fn codegen_system_header(&self) -> String {
        let mut output = String::new();
        output.push_str("#pragma once\n\n");
        file_info(&mut output, "codegen_system_header");

        output.push_str("#include <core/types.hpp>\n\n");
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n");

        output.push_str("enum_class\n(\n\tObject, u16,\n\n");
        for &index in &self.sorted {
            output.push_str(&format!("\t{},\n", self.files[index].name));
        }
        output.push_str(");\n\n");

        output.push_str(&format!(
            "namespace CoreObjects\n{{\n\tconstexpr u16 TYPE_COUNT = {};\n}}\n\n",
            self.sorted.len()
        ));

        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n");
        output.push_str("enum_class\n(\n\tObjectCategory, u16,\n\n\tDEFAULT,\n");
        for (_, category) in &self.registry.categories {
            output.push_str(&format!("\t{category},\n"));
        }
        output.push_str(");\n\n");

        output.push_str(&format!(
            "namespace CoreObjects\n{{\n\tconstexpr u16 CATEGORY_COUNT = {};\n}}\n\n",
            self.registry.categories.len() + 1
        ));

        output.push_str(COMMENT_BREAK);
        output
    }

    /// `objects.generated.hpp`: class definitions and construct tables.
    pub fn codegen_objects_header(&self) -> String {
        let mut output = String::new();
        output.push_str("#pragma once\n\n");
        file_info(&mut output, "codegen_objects_header");

        output.push_str("// SYSTEM INCLUDES\n");
        output.push_str("#include <vendor/new.hpp>\n");
        output.push_str("#include <ember/objects.hpp>\n\n");

        output.push_str("// HEADER_INCLUDES\n");
        if self.registry.header_includes.is_empty() {
            output.push_str("// ...\n");
        } else {
            output.push_str(&self.registry.header_includes);
            output.push('\n');
        }

        for &index in &self.sorted {
            output.push_str(&self.files[index].write_header(&self.files));
        }

        // Construct / destruct tables
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n__INTERNAL_OBJECT_SYSTEM_BEGIN\n");
        output.push_str("constexpr void ( *TYPE_CONSTRUCT[] )( void * ) =\n{\n");
        for &index in &self.sorted {
            output.push_str(&format!(
                "\t[]( void *object ) {{ new ( object ) {}(); }},\n",
                self.files[index].type_name
            ));
        }
        output.push_str("};\n\n");

        output.push_str("constexpr void ( *TYPE_DESTRUCT[] )( void * ) =\n{\n");
        for &index in &self.sorted {
            output.push_str(&format!(
                "\t[]( void *object ) {{ reinterpret_cast<{}*>( object )->~{}(); }},\n",
                self.files[index].type_name, self.files[index].type_name
            ));
        }
        output.push_str("};\n");
        output.push_str("__INTERNAL_OBJECT_SYSTEM_END\n\n");

        output.push_str(COMMENT_BREAK);
        output
    }

    /// `objects.generated.cpp`: type tables, event dispatch, and method
    /// bodies.
    pub fn codegen_objects_source(&self) -> Result<String, ObjectError> {
        let mut output = String::new();
        file_info(&mut output, "codegen_objects_source");

        output.push_str("// SYSTEM INCLUDES\n");
        output.push_str("#include <vendor/new.hpp>\n");
        output.push_str("#include <core/serializer.hpp>\n");
        output.push_str("#include <ember/objects.hpp>\n\n");

        output.push_str("// SOURCE_INCLUDES\n");
        if self.registry.source_includes.is_empty() {
            output.push_str("// ...\n");
        } else {
            output.push_str(&self.registry.source_includes);
            output.push('\n');
        }

        // Safety define: INHERIT is rewritten away for every object with a
        // real parent; this neutralizes stray uses in DEFAULT children.
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n#define INHERIT\n\n");

        self.generate_source_system(&mut output)?;
        self.generate_source_events(&mut output);

        // Per-object handles
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n");
        for &index in &self.sorted {
            let name = &self.files[index].name;
            output.push_str(&format!(
                "template <> ObjectHandle<Object::{name}> ObjectInstance::handle<Object::{name}>( const ObjectContext &context ) const\n{{\n"
            ));
            output.push_str("\treturn { context.get_object_pointer( *this ) };\n}\n\n");
        }

        for &index in &self.sorted {
            output.push_str(&self.files[index].write_source(&self.files));
        }

        output.push_str(COMMENT_BREAK);
        Ok(output)
    }

    fn generate_source_system(&self, output: &mut String) -> Result<(), ObjectError> {
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n");

        // CATEGORY_TYPE_BUCKET: dense bucket index per (category, type).
        let mut category_type_counts = Vec::new();
        output.push_str(
            "const u16 CoreObjects::CATEGORY_TYPE_BUCKET[CoreObjects::CATEGORY_COUNT][CoreObjects::TYPE_COUNT] =\n{\n",
        );
        category_type_counts.push(self.category_types_mapped(output, None));
        for (hash, category) in &self.registry.categories {
            category_type_counts.push(self.category_types_mapped(output, Some((*hash, category))));
        }
        output.push_str("};\n\n");

        // CATEGORY_TYPES: sorted type indices per category.
        output.push_str(
            "const u16 CoreObjects::CATEGORY_TYPES[CoreObjects::CATEGORY_COUNT][CoreObjects::TYPE_COUNT] =\n{\n",
        );
        self.category_types(output, None);
        for (hash, category) in &self.registry.categories {
            self.category_types(output, Some((*hash, category)));
        }
        output.push_str("};\n\n");

        // CATEGORY_TYPE_COUNT
        output.push_str("const u16 CoreObjects::CATEGORY_TYPE_COUNT[CoreObjects::CATEGORY_COUNT] =\n{\n");
        let counts: Vec<String> = category_type_counts
            .iter()
            .map(|c| c.to_string())
            .collect();
        append_wrapped(output, "\t", &counts, 8);
        output.push_str("};\n\n");

        // CATEGORY_NAME
        output.push_str("#if COMPILE_DEBUG\n");
        output.push_str("const char *CoreObjects::CATEGORY_NAME[CoreObjects::CATEGORY_COUNT] =\n{\n");
        output.push_str("\t\"DEFAULT\",\n");
        for (_, category) in &self.registry.categories {
            output.push_str(&format!("\t\"{category}\",\n"));
        }
        output.push_str("};\n#endif\n\n");

        // TYPE_SIZE / TYPE_ALIGNMENT
        output.push_str("const u16 CoreObjects::TYPE_SIZE[CoreObjects::TYPE_COUNT] =\n{\n");
        for &index in &self.sorted {
            output.push_str(&format!(
                "\tsizeof( CoreObjects::{} ),\n",
                self.files[index].type_name
            ));
        }
        output.push_str("};\n\n");

        output.push_str("const u16 CoreObjects::TYPE_ALIGNMENT[CoreObjects::TYPE_COUNT] =\n{\n");
        for &index in &self.sorted {
            output.push_str(&format!(
                "\talignof( CoreObjects::{} ),\n",
                self.files[index].type_name
            ));
        }
        output.push_str("};\n\n");

        // TYPE_NAME
        output.push_str("#if COMPILE_DEBUG\n");
        output.push_str("const char *CoreObjects::TYPE_NAME[CoreObjects::TYPE_COUNT] =\n{\n");
        for &index in &self.sorted {
            output.push_str(&format!("\t\"{}\",\n", self.files[index].name));
        }
        output.push_str("};\n#endif\n\n");

        // TYPE_BUCKET_CAPACITY
        output.push_str("const u16 CoreObjects::TYPE_BUCKET_CAPACITY[CoreObjects::TYPE_COUNT] =\n{\n");
        let capacities: Vec<String> = self
            .sorted
            .iter()
            .map(|&i| {
                let file = &self.files[i];
                if file.instantiable() {
                    file.bucket_size.to_string()
                } else {
                    "0".to_owned()
                }
            })
            .collect();
        append_wrapped(output, "\t", &capacities, 8);
        output.push_str("};\n\n");

        // TYPE_MAX_COUNT
        output.push_str("const u32 CoreObjects::TYPE_MAX_COUNT[CoreObjects::TYPE_COUNT] =\n{\n");
        let max_counts: Vec<String> = self
            .sorted
            .iter()
            .map(|&i| {
                let file = &self.files[i];
                if file.instantiable() {
                    file.count_max.to_string()
                } else {
                    "0".to_owned()
                }
            })
            .collect();
        append_wrapped(output, "\t", &max_counts, 8);
        output.push_str("};\n\n");

        // TYPE_INHERITANCE_DEPTH
        output.push_str("const u16 CoreObjects::TYPE_INHERITANCE_DEPTH[CoreObjects::TYPE_COUNT] =\n{\n");
        let depths: Vec<String> = self
            .sorted
            .iter()
            .map(|&i| self.files[i].depth.to_string())
            .collect();
        append_wrapped(output, "\t", &depths, 8);
        output.push_str("};\n\n");

        // TYPE_HASH, with collision detection across the sorted set.
        let mut seen = HashSet::new();
        output.push_str("const u32 CoreObjects::TYPE_HASH[CoreObjects::TYPE_COUNT] =\n{\n");
        let mut hashes = Vec::new();
        for &index in &self.sorted {
            let file = &self.files[index];
            let hash = if file.hash.is_empty() {
                0
            } else {
                hash32(&file.hash)
            };
            if hash != 0 && !seen.insert(hash) {
                return Err(ObjectError::Validate(format!(
                    "Object '{}' has a HASH collision!",
                    file.name
                )));
            }
            hashes.push(file.hash_hex.clone());
        }
        append_wrapped(output, "\t", &hashes, 8);
        output.push_str("};\n\n");

        // TYPE_SERIALIZED
        output.push_str("const bool CoreObjects::TYPE_SERIALIZED[CoreObjects::TYPE_COUNT] =\n{\n");
        let serialized: Vec<String> = self
            .sorted
            .iter()
            .map(|&i| if self.files[i].has_serialize { "1" } else { "0" }.to_owned())
            .collect();
        append_wrapped(output, "\t", &serialized, 16);
        output.push_str("};\n\n");

        // init / free
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n");
        output.push_str("bool CoreObjects::init()\n{\n");
        output.push_str("\tObjectInstance::Serialization::init();\n\n\treturn true;\n}\n\n");
        output.push_str("bool CoreObjects::free()\n{\n");
        output.push_str("\tObjectInstance::Serialization::free();\n\n\treturn true;\n}\n\n");

        // Context-level serialize / deserialize
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n");
        output.push_str("void CoreObjects::serialize( Serializer &serializer, const ObjectContext &context )\n{\n");
        output.push_str("\tObjectInstance::Serialization::prepare( context );\n");
        for &index in &self.sorted {
            let file = &self.files[index];
            if !file.has_serialize {
                continue;
            }
            output.push_str(&format!(
                "\tserializer.write( {}, ObjectContextSerializer<Object::{}>{{ context }} );\n",
                file.hash_hex, file.name
            ));
        }
        output.push_str("}\n\n");

        output.push_str("bool CoreObjects::deserialize( Deserializer &deserializer, ObjectContext &context )\n{\n");
        for &index in &self.sorted {
            let file = &self.files[index];
            if !file.has_serialize {
                continue;
            }
            output.push_str(&format!(
                "\t{{ ObjectContextDeserializerA<Object::{}> type {{ context }}; if( !deserializer.read( {}, type ) ) {{ return false; }} }}\n",
                file.name, file.hash_hex
            ));
        }
        output.push_str("\tObjectInstance::Serialization::prepare( context );\n");
        for &index in &self.sorted {
            let file = &self.files[index];
            if !file.has_serialize {
                continue;
            }
            output.push_str(&format!(
                "\t{{ ObjectContextDeserializerB<Object::{}> type {{ context }}; if( !deserializer.read( {}, type ) ) {{ return false; }} }}\n",
                file.name, file.hash_hex
            ));
        }
        output.push_str("\treturn true;\n}\n\n");

        Ok(())
    }

    /// One CATEGORY_TYPE_BUCKET row; returns the category's type count.
    fn category_types_mapped(&self, output: &mut String, category: Option<(u32, &str)>) -> u16 {
        // Every category holds at least the root type.
        let mut count: u16 = 1;
        let name = category.map_or("DEFAULT", |(_, name)| name);
        output.push_str(&format!("\t{{ // {name}\n"));

        let buckets: Vec<String> = self
            .sorted
            .iter()
            .map(|&i| {
                let file = &self.files[i];
                let matches = file.instantiable()
                    && category.is_none_or(|(hash, _)| file.categories.contains(&hash));
                if matches {
                    let bucket = count;
                    count += 1;
                    bucket.to_string()
                } else {
                    "0".to_owned()
                }
            })
            .collect();
        append_wrapped(output, "\t\t", &buckets, 16);

        output.push_str("\t},\n");
        count
    }

    /// One CATEGORY_TYPES row: the sorted type indices in the category.
    fn category_types(&self, output: &mut String, category: Option<(u32, &str)>) {
        let name = category.map_or("DEFAULT", |(_, name)| name);
        output.push_str(&format!("\t{{ // {name}\n"));

        let types: Vec<String> = self
            .sorted
            .iter()
            .enumerate()
            .filter(|&(position, &i)| {
                let file = &self.files[i];
                position == 0
                    || (file.instantiable()
                        && category.is_none_or(|(hash, _)| file.categories.contains(&hash)))
            })
            .map(|(position, _)| position.to_string())
            .collect();
        append_wrapped(output, "\t\t", &types, 16);

        output.push_str("\t},\n");
    }

    /// Per-category event loops, the dispatch table, and the context
    /// entry point for every void, non-CREATE event.
    fn generate_source_events(&self, output: &mut String) {
        for event_id in 0..EVENT_COUNT {
            if event_id == KW_EVENT_CREATE {
                continue;
            }
            let signature = EVENT_FUNCTIONS[event_id];
            if signature.return_type != "void" {
                continue;
            }

            // Parameter tails: "( const Delta delta )" -> ", const Delta delta )"
            let params_tail = &signature.params[1..];
            let caller_tail = &signature.caller_args[1..];
            let separator = if signature.params == "()" { " " } else { "," };

            output.push_str(COMMENT_BREAK);
            output.push_str("\n\n__INTERNAL_OBJECT_SYSTEM_BEGIN\n");

            let mut category_functions = Vec::new();
            category_functions.push(self.event_category_function(output, event_id, None));
            for (hash, category) in &self.registry.categories {
                category_functions
                    .push(self.event_category_function(output, event_id, Some((*hash, category))));
            }

            // Dispatch table indexed by category.
            output.push_str(&format!(
                "static void ( *{}[] )( ObjectContext &context{separator}{params_tail} = \n{{\n",
                signature.name
            ));
            for function in &category_functions {
                output.push_str(&format!("\t{function},\n"));
            }
            output.push_str("};\n__INTERNAL_OBJECT_SYSTEM_END\n\n");

            // ObjectContext entry point.
            output.push_str(&format!(
                "void ObjectContext::{}{}\n{{\n",
                signature.name, signature.params
            ));
            output.push_str(&format!(
                "\tif( CoreObjects::{}[category] == nullptr ) {{ return; }}\n",
                signature.name
            ));
            output.push_str(&format!(
                "\tCoreObjects::{}[category]( *this{separator}{caller_tail};\n",
                signature.name
            ));
            output.push_str("}\n\n");
        }
    }

    /// Emits one category's event loop; returns the table entry (the
    /// function name, or `nullptr` when no object participates).
    fn event_category_function(
        &self,
        output: &mut String,
        event_id: usize,
        category: Option<(u32, &str)>,
    ) -> String {
        let signature = EVENT_FUNCTIONS[event_id];
        let name = category.map_or("DEFAULT", |(_, name)| name);
        let params_tail = &signature.params[1..];
        let separator = if signature.params == "()" { " " } else { "," };

        let mut event = String::new();
        let mut generated = false;
        event.push_str(&format!(
            "void {}_{name}( ObjectContext &context{separator}{params_tail}\n{{\n",
            signature.name
        ));
        for &index in &self.sorted {
            let file = &self.files[index];
            if !file.instantiable()
                || !file.events[event_id].inherits
                || file.events[event_id].disabled
                || file.events[event_id].manual
            {
                continue;
            }
            if let Some((hash, _)) = category {
                if !file.categories.contains(&hash) {
                    continue;
                }
            }

            event.push_str(&format!(
                "\tforeach_object( context, Object::{}, h ) {{ h->{}{}; }}\n",
                file.name, signature.name, signature.caller_args
            ));
            generated = true;
        }
        event.push_str("}\n\n");

        if generated {
            output.push_str(&event);
            format!("{}_{name}", signature.name)
        } else {
            "nullptr".to_owned()
        }
    }

    /// `objects.generated.intellisense`: inherited members per object, for
    /// editor tooling only.
    pub fn codegen_intellisense(&self) -> String {
        let mut output = String::new();
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n/*\n");
        output.push_str(" * File generated by the asset build tool.\n *\n");
        output.push_str(" * Enables IntelliSense for members inherited through the object system.\n");
        output.push_str(" * This file is NOT compiled into the runtime executable!\n */\n\n");
        output.push_str(COMMENT_BREAK);
        output.push_str("\n\n#pragma once\n\n");

        for &index in &self.sorted {
            let file = &self.files[index];
            output.push_str(COMMENT_BREAK);
            output.push_str("\n\n");
            output.push_str(&format!(
                "namespace CoreObjects::ObjectIntelliSense_{}\n{{\n",
                file.name
            ));
            for variable in &file.inherited_variables {
                output.push_str(&format!("\t{variable}\n"));
            }
            for function in &file.inherited_functions {
                output.push_str(&format!("\t{function}\n"));
            }
            for event in &file.inherited_events {
                output.push_str(&format!("\t{event}\n"));
            }
            output.push_str("}\n\n");
        }

        output.push_str(COMMENT_BREAK);
        output
    }
}

#[cfg(test)]
mod tests {
    use crate::file::ObjectFile;
    use crate::Objects;

    fn compile(sources: &[&str]) -> Objects {
        let mut objects = Objects::new();
        for _ in sources {
            objects.files.push(ObjectFile::default());
        }

        let (files, registry) = (&mut objects.files, &mut objects.registry);
        files[0].parse(registry).unwrap();
        for (i, source) in sources.iter().enumerate() {
            files[i + 1].parse_buffer(source, registry).unwrap();
        }

        objects.resolve().unwrap();
        objects.validate().unwrap();
        objects
    }

    #[test]
    fn system_header_lists_sorted_types() {
        let objects = compile(&[
            "OBJECT( Actor ) PARENT( DEFAULT ) ABSTRACT( true )",
            "OBJECT( Player ) PARENT( Actor ) CATEGORY( Pawns )",
        ]);
        let header = objects.codegen_system_header();

        let default = header.find("\tDEFAULT,").unwrap();
        let actor = header.find("\tActor,").unwrap();
        let player = header.find("\tPlayer,").unwrap();
        assert!(default < actor && actor < player);

        assert!(header.contains("TYPE_COUNT = 3"));
        assert!(header.contains("\tPawns,"));
        assert!(header.contains("CATEGORY_COUNT = 2"));
    }

    #[test]
    fn header_declares_unique_members_only() {
        let objects = compile(&[
            "OBJECT( A ) PARENT( DEFAULT )\nPUBLIC int x;",
            "OBJECT( B ) PARENT( A )\nPUBLIC int y;",
        ]);
        let header = objects.codegen_objects_header();

        assert!(header.contains("class A_t : public DEFAULT_t"));
        assert!(header.contains("class B_t : public A_t"));

        // B declares y only; x lives in A.
        let b_class = header.split("class B_t").nth(1).unwrap();
        let b_class = &b_class[..b_class.find("};").unwrap()];
        assert!(b_class.contains("int y;"));
        assert!(!b_class.contains("int x;"));
    }

    #[test]
    fn source_calls_parent_event() {
        let objects = compile(&[
            "OBJECT( A ) PARENT( DEFAULT )\nEVENT_UPDATE\n{\n\tstep();\n}",
            "OBJECT( B ) PARENT( A )\nEVENT_UPDATE\n{\n\tjump();\n}",
        ]);
        let source = objects.codegen_objects_source().unwrap();

        assert!(source.contains("void CoreObjects::B_t::event_update( const Delta delta )"));
        assert!(source.contains("CoreObjects::A_t::event_update( delta );"));
    }

    #[test]
    fn noinherit_suppresses_parent_call() {
        let objects = compile(&[
            "OBJECT( A ) PARENT( DEFAULT )\nEVENT_UPDATE\n{\n\tstep();\n}",
            "OBJECT( B ) PARENT( A )\nEVENT_UPDATE NOINHERIT\n{\n\tjump();\n}",
        ]);
        let source = objects.codegen_objects_source().unwrap();

        let body = source.split("void CoreObjects::B_t::event_update").nth(1).unwrap();
        let body = &body[..body.find("}\n\n").unwrap()];
        assert!(!body.contains("CoreObjects::A_t::event_update"));
    }

    #[test]
    fn inherit_token_is_rewritten() {
        let objects = compile(&[
            "OBJECT( A ) PARENT( DEFAULT )\nPUBLIC void act()\n{\n\tidle();\n}",
            "OBJECT( B ) PARENT( A )\nPUBLIC void act()\n{\n\tINHERIT::act();\n}",
        ]);
        let source = objects.codegen_objects_source().unwrap();
        assert!(source.contains("CoreObjects::A_t::act();"));
    }

    #[test]
    fn hash_collision_is_fatal() {
        let objects = compile(&[
            "OBJECT( A ) PARENT( DEFAULT ) HASH( same )",
            "OBJECT( B ) PARENT( DEFAULT ) HASH( same )",
        ]);
        assert!(objects.codegen_objects_source().is_err());
    }

    #[test]
    fn event_dispatch_skips_manual_and_abstract() {
        let objects = compile(&[
            "OBJECT( Base ) PARENT( DEFAULT ) ABSTRACT( true )\nEVENT_UPDATE\n{\n\ttick();\n}",
            "OBJECT( Solid ) PARENT( Base )",
            "OBJECT( Ghost ) PARENT( Base )\nEVENT_UPDATE MANUAL\n{\n\ttick();\n}",
        ]);
        let source = objects.codegen_objects_source().unwrap();

        let dispatch = source
            .split("void event_update_DEFAULT")
            .nth(1)
            .unwrap();
        let dispatch = &dispatch[..dispatch.find("}\n\n").unwrap()];

        // Solid inherits the update loop; Base is abstract and Ghost is
        // manual, so neither is iterated.
        assert!(dispatch.contains("Object::Solid"));
        assert!(!dispatch.contains("Object::Base"));
        assert!(!dispatch.contains("Object::Ghost"));
    }

    #[test]
    fn intellisense_lists_inherited_members() {
        let objects = compile(&[
            "OBJECT( A ) PARENT( DEFAULT )\nPUBLIC int health;",
            "OBJECT( B ) PARENT( A )",
        ]);
        let listing = objects.codegen_intellisense();

        let b = listing
            .split("ObjectIntelliSense_B\n{")
            .nth(1)
            .unwrap();
        let b = &b[..b.find('}').unwrap()];
        assert!(b.contains("int health;"));
        assert!(b.contains("ObjectInstance id;"));
    }
}
