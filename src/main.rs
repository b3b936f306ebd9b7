fn main() {
    ptzclick_lib::run();
}
