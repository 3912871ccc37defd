//! Label trees: ordered keyword/group/object hierarchies with a PVL text
//! form, an XML form and a reader for VICAR label items.

pub mod pvl;
pub mod tree;
pub mod vicar;
pub mod xml;

pub use tree::{Container, Keyword, Node, Traverse, Value};

/// Alias used where a container is the root of a whole label.
pub type Label = Container;

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_label() -> Label {
        let mut dims = Container::new("Dimensions");
        dims.add_keyword(Keyword::new("Samples", "32"));
        dims.add_keyword(Keyword::new("Lines", "32"));
        dims.add_keyword(Keyword::new("Bands", "3"));

        let mut pixels = Container::new("Pixels");
        pixels.add_keyword(Keyword::new("Type", "Real"));
        pixels.add_keyword(Keyword::new("ByteOrder", "Lsb"));
        pixels.add_keyword(Keyword::new("Base", "0.0"));
        pixels.add_keyword(Keyword::new("Multiplier", "1.0"));

        let mut core = Container::new("Core");
        core.add_keyword(Keyword::new("StartByte", "65537"));
        core.add_keyword(Keyword::new("Format", "BandSequential"));
        core.add_group(dims);
        core.add_group(pixels);

        let mut inst = Container::new("Instrument");
        inst.add_keyword(Keyword::new("SpacecraftName", Value::quoted("Mars Global Surveyor")));
        let mut filters = Keyword::array("FilterName", ["RED", "BLUE"]);
        filters.add_comment("filter wheel positions");
        inst.add_keyword(filters);
        inst.add_keyword(Keyword::array(
            "Center",
            [Value::with_unit("600", "nm"), Value::with_unit("450", "nm")],
        ));
        inst.add_keyword(Keyword::with_unit("ExposureDuration", "12.5", "ms"));

        let mut cube = Container::new("IsisCube");
        cube.add_object(core);
        cube.add_group(inst);

        let mut root = Label::root();
        root.add_object(cube);
        let mut original = Container::new("Label");
        original.add_keyword(Keyword::new("Bytes", "65536"));
        root.add_object(original);
        root
    }

    #[test]
    fn test_pvl_round_trip() {
        let label = cube_label();
        let text = pvl::emit(&label);
        let back = pvl::parse(&text).unwrap();
        assert_eq!(back, label);
        assert_eq!(pvl::emit(&back), text);
    }

    #[test]
    fn test_xml_and_pvl_agree() {
        let label = cube_label();
        let xml = xml::emit(&label).unwrap();
        let from_xml = xml::parse(&xml).unwrap();
        assert_eq!(pvl::emit(&from_xml), pvl::emit(&label));
    }

    #[test]
    fn test_order_is_preserved() {
        let label = cube_label();
        let back = pvl::parse(&pvl::emit(&label)).unwrap();
        let cube = back.object("IsisCube", Traverse::CurrentLevel).unwrap();
        let names: Vec<&str> = cube
            .group("Instrument", Traverse::CurrentLevel)
            .unwrap()
            .keywords()
            .map(|k| k.name.as_str())
            .collect();
        assert_eq!(names, ["SpacecraftName", "FilterName", "Center", "ExposureDuration"]);
    }
}
