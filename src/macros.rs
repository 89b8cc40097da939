/// Logs through a device's own log sink, prefixing the message with the device address.
macro_rules! device_log {
    ($device:expr, $lvl:expr, $($arg:tt)+) => {{
        let device = &$device;
        let logger = device.log_sink.logger();
        let metadata = ::log::Metadata::builder()
            .level($lvl)
            .target($crate::device::LOG_TARGET)
            .build();
        if logger.enabled(&metadata) {
            logger.log(&::log::Record::builder()
                .metadata(metadata)
                .args(format_args!("[{}] {}", device.address, format_args!($($arg)+)))
                .module_path(Some(module_path!()))
                .file(Some(file!()))
                .line(Some(line!()))
                .build());
        }
    }};
}
