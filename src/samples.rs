// Recorded export API responses used by the tests
pub const PREDMET_INFO: &str = include_str!("../samples/predmet_info.xml");
pub const BLOK_DEJ_OBSAH: &str = include_str!("../samples/blok_dej_obsah.xml");
pub const PREDMET_SEZNAM: &str = include_str!("../samples/predmet_seznam.xml");
pub const SEMINAR_SEZNAM: &str = include_str!("../samples/seminar_seznam.xml");
pub const SEMINAR_CVICICI_SEZNAM: &str = include_str!("../samples/seminar_cvicici_seznam.xml");
pub const BLOKY_SEZNAM: &str = include_str!("../samples/bloky_seznam.xml");
pub const TERMINY_SEZNAM: &str = include_str!("../samples/terminy_seznam.xml");
pub const ZAPIS_OK: &str = include_str!("../samples/zapis_ok.xml");
pub const CHYBA: &str = include_str!("../samples/chyba.xml");
