pub mod file_operations;

pub use file_operations::{
    copy_with_metadata, ensure_directory, existing_entry_names, list_matching_files,
    matches_name, remove_file,
};
