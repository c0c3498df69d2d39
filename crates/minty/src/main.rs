fn main() {
    std::process::exit(minty::Application::new().run());
}
