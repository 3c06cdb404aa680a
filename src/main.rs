fn main() -> anyhow::Result<()> {
    swipecard::logging::init();
    swipecard::cli::run()
}
