use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs)]
#[argh(description = "Edit FAT16 disk images without mounting them")]
pub struct App {
    #[argh(switch, short = 'v', description = "display debug messages")]
    pub verbose: bool,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Info(InfoCommand),
    List(ListCommand),
    Add(AddCommand),
    Format(FormatCommand),
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "info",
    description = "print the layout of a FAT16 volume"
)]
pub struct InfoCommand {
    #[argh(positional, description = "disk image or block device")]
    pub image: PathBuf,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "list",
    description = "list the files of the root directory"
)]
pub struct ListCommand {
    #[argh(positional, description = "disk image or block device")]
    pub image: PathBuf,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "add",
    description = "copy files into the root directory"
)]
pub struct AddCommand {
    #[argh(positional, description = "disk image or block device")]
    pub image: PathBuf,

    #[argh(positional, description = "files to copy")]
    pub files: Vec<PathBuf>,
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "format",
    description = "write a blank FAT16 volume"
)]
pub struct FormatCommand {
    #[argh(
        positional,
        description = "disk image or block device, created when missing"
    )]
    pub image: PathBuf,

    #[argh(
        option,
        description = "volume size in 512-byte sectors (defaults to the target size)"
    )]
    pub sectors: Option<u64>,

    #[argh(option, description = "volume label")]
    pub label: Option<String>,

    #[argh(
        option,
        long = "volume-id",
        from_str_fn(parse_volume_id),
        description = "volume serial number, decimal or 0x-prefixed hex"
    )]
    pub volume_id: Option<u32>,
}

fn parse_volume_id(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid volume id {value:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_volume_id() {
        assert_eq!(parse_volume_id("0x1234ABCD"), Ok(0x1234_ABCD));
        assert_eq!(parse_volume_id("42"), Ok(42));
        assert!(parse_volume_id("0xZZ").is_err());
        assert!(parse_volume_id("-1").is_err());
    }

    #[test]
    fn test_parse_add() {
        let app = App::from_args(&["fatpack"], &["-v", "add", "disk.img", "a.txt", "b.bin"]).unwrap();
        assert!(app.verbose);
        let Command::Add(add) = app.command else {
            panic!("expected the add command");
        };
        assert_eq!(add.image, PathBuf::from("disk.img"));
        assert_eq!(add.files, [PathBuf::from("a.txt"), PathBuf::from("b.bin")]);
    }

    #[test]
    fn test_parse_format() {
        let app = App::from_args(
            &["fatpack"],
            &["format", "disk.img", "--sectors", "20000", "--volume-id", "0xCAFE"],
        )
        .unwrap();
        let Command::Format(format) = app.command else {
            panic!("expected the format command");
        };
        assert_eq!(format.sectors, Some(20_000));
        assert_eq!(format.volume_id, Some(0xCAFE));
        assert_eq!(format.label, None);
    }
}
