fn main() {
    medtrack_lib::run()
}
