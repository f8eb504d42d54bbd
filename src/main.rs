fn main() {
    chat_widget_lib::run()
}
