pub mod json_lines_sink;
