fn main() {
    built::write_built_file().expect("failed to write build information");
}
