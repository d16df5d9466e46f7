fn main() {
    music_pulse_lib::run()
}
